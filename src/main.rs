use gradejar::*;

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every `.class` file under a directory
fn class_files(root: &Path) -> Result<Vec<PathBuf>, transform::Error> {
    let mut paths = vec![];
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == "class")
        {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn main() -> Result<(), transform::Error> {
    env_logger::init();

    let matches = Command::new("Graded class rewriter")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Rewrites submission classes so calls can be logged, substituted, or delegated")
        .arg(
            Arg::new("submission")
                .long("submission")
                .value_name("DIR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory of compiled submission classes"),
        )
        .arg(
            Arg::new("solution")
                .long("solution")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory of compiled reference classes"),
        )
        .arg(
            Arg::new("library")
                .long("library")
                .value_name("DIR")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Directory of other classes the submission extends"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .value_name("DIR")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory the rewritten classes are written into"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("SIMILARITY")
                .value_parser(value_parser!(f64))
                .help("Minimum name similarity for pairing submission and reference declarations"),
        )
        .arg(
            Arg::new("runtime package")
                .long("runtime-package")
                .value_name("PACKAGE")
                .help("Package of the runtime classes, in internal form (eg. `gradejar/runtime`)"),
        )
        .get_matches();

    let mut settings = transform::Settings::new()?;
    if let Some(threshold) = matches.get_one::<f64>("threshold") {
        settings.set_similarity_threshold(*threshold)?;
    }
    if let Some(package) = matches.get_one::<String>("runtime package") {
        settings.runtime = transform::RuntimeNames::in_package(package)?;
    }

    let mut transformer = transform::ModuleTransformer::new(settings);

    if let Some(submission) = matches.get_one::<PathBuf>("submission") {
        log::info!("Reading submission classes from '{}'", submission.display());
        for path in class_files(submission)? {
            transformer.add_submission_class(&fs::read(&path)?)?;
        }
    }
    if let Some(solution) = matches.get_one::<PathBuf>("solution") {
        log::info!("Reading reference classes from '{}'", solution.display());
        for path in class_files(solution)? {
            transformer.add_solution_class(&fs::read(&path)?)?;
        }
    }
    for library in matches.get_many::<PathBuf>("library").into_iter().flatten() {
        for path in class_files(library)? {
            transformer.add_library_class(&fs::read(&path)?)?;
        }
    }

    // Write out the results
    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    for (class_name, class) in transformer.transform()? {
        let class_file = output.join(format!("{}.class", class_name));
        log::info!("Writing '{}'", class_file.display());
        class.save_to_path(&class_file, true)?;
    }

    Ok(())
}
