//! Rewrites `javac` output, then runs it on a JVM against small runtime stand-ins
//!
//! Skipped (with a note on stderr) when `javac` or `java` is not on the `PATH`.

use gradejar::transform::{ModuleTransformer, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Execution handler that logs everything and substitutes only what `Main` asks it to
const EXECUTION_HANDLER: &str = r#"
package gradejar.runtime;

import java.util.ArrayList;
import java.util.HashMap;
import java.util.List;
import java.util.Map;

public final class ExecutionHandler {
    private static final ExecutionHandler INSTANCE = new ExecutionHandler();

    public final List<String> log = new ArrayList<>();
    private final Map<String, MethodSubstitution> substitutions = new HashMap<>();

    public static ExecutionHandler getInstance() {
        return INSTANCE;
    }

    public void substitute(String name, String descriptor, MethodSubstitution substitution) {
        substitutions.put(name + descriptor, substitution);
    }

    public boolean logInvocation(MethodHeader header) {
        return true;
    }

    public void addInvocation(MethodHeader header, Invocation invocation) {
        log.add("call " + header.owner + "." + header.name + header.descriptor + " " + invocation.parameters);
    }

    public boolean useSubstitution(MethodHeader header) {
        return substitutions.containsKey(header.name + header.descriptor);
    }

    public MethodSubstitution getSubstitution(MethodHeader header) {
        return substitutions.get(header.name + header.descriptor);
    }

    public boolean useReferenceImpl(MethodHeader header) {
        return false;
    }

    public void recordStaticFieldValue(String owner, String name, Object value) {
        log.add("static " + owner + "." + name + " = " + value);
    }
}
"#;

const INVOCATION: &str = r#"
package gradejar.runtime;

import java.util.ArrayList;
import java.util.List;

public final class Invocation {
    public final Class<?> owner;
    public final MethodHeader header;
    public final StackTraceElement[] stackTrace;
    public final List<Object> parameters = new ArrayList<>();
    public Object instance;

    public Invocation(Class<?> owner, MethodHeader header, StackTraceElement[] stackTrace) {
        this.owner = owner;
        this.header = header;
        this.stackTrace = stackTrace;
    }

    public void setInstance(Object instance) {
        this.instance = instance;
    }

    public void addParameter(Object parameter) {
        parameters.add(parameter);
    }
}
"#;

const METHOD_HEADER: &str = r#"
package gradejar.runtime;

public final class MethodHeader {
    public final String owner;
    public final int access;
    public final String name;
    public final String descriptor;
    public final String signature;
    public final String[] exceptions;

    public MethodHeader(String owner, int access, String name, String descriptor, String signature, String[] exceptions) {
        this.owner = owner;
        this.access = access;
        this.name = name;
        this.descriptor = descriptor;
        this.signature = signature;
        this.exceptions = exceptions;
    }
}
"#;

const METHOD_SUBSTITUTION: &str = r#"
package gradejar.runtime;

public interface MethodSubstitution {
    Object execute(Invocation invocation);

    default ConstructorInvocation getConstructorInvocation() {
        return ConstructorInvocation.of("java/lang/Object", "()V");
    }

    interface ConstructorInvocation {
        String owner();

        String descriptor();

        Object[] args();

        static ConstructorInvocation of(String owner, String descriptor, Object... args) {
            return new ConstructorInvocation() {
                public String owner() {
                    return owner;
                }

                public String descriptor() {
                    return descriptor;
                }

                public Object[] args() {
                    return args;
                }
            };
        }
    }
}
"#;

fn have_jdk() -> bool {
    ["javac", "java"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .output()
            .map_or(false, |output| output.status.success())
    })
}

/// Write `(file name, contents)` pairs into `dir`
fn write_sources(dir: &Path, sources: &[(&str, &str)]) -> Vec<PathBuf> {
    fs::create_dir_all(dir).unwrap();
    sources
        .iter()
        .map(|(name, contents)| {
            let path = dir.join(name);
            fs::write(&path, contents).unwrap();
            path
        })
        .collect()
}

fn javac(classpath: &Path, output: &Path, sources: &[PathBuf]) {
    fs::create_dir_all(output).unwrap();
    let compile_output = Command::new("javac")
        .arg("-cp")
        .arg(classpath)
        .arg("-d")
        .arg(output)
        .args(sources)
        .output()
        .unwrap();
    assert!(
        compile_output.status.success(),
        "javac failed:\n{}",
        String::from_utf8_lossy(&compile_output.stderr)
    );
}

fn class_files(root: &Path) -> Vec<Vec<u8>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(Result::unwrap)
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "class"))
        .map(|entry| fs::read(entry.path()).unwrap())
        .collect()
}

/// Compile the submission and reference, rewrite them, then compile and run `Main` against the
/// rewritten classes and the runtime stand-ins
///
/// Returns the standard output of `Main`, or `None` without a JDK.
fn run_rewritten(
    submission: &[(&str, &str)],
    solution: &[(&str, &str)],
    main: &str,
) -> Option<String> {
    if !have_jdk() {
        eprintln!("skipping: javac and java are needed to run rewritten classes");
        return None;
    }

    let work = tempfile::tempdir().unwrap();
    let root = work.path();
    let output = root.join("out");

    let mut transformer = ModuleTransformer::new(Settings::new().unwrap());
    let submission_classes = root.join("classes/submission");
    javac(
        &submission_classes,
        &submission_classes,
        &write_sources(&root.join("src/submission"), submission),
    );
    for bytes in class_files(&submission_classes) {
        transformer.add_submission_class(&bytes).unwrap();
    }
    if !solution.is_empty() {
        let solution_classes = root.join("classes/solution");
        javac(
            &solution_classes,
            &solution_classes,
            &write_sources(&root.join("src/solution"), solution),
        );
        for bytes in class_files(&solution_classes) {
            transformer.add_solution_class(&bytes).unwrap();
        }
    }

    for (name, class_file) in transformer.transform().unwrap() {
        class_file
            .save_to_path(output.join(format!("{}.class", name)), true)
            .unwrap();
    }

    let harness = write_sources(
        &root.join("src/run"),
        &[
            ("ExecutionHandler.java", EXECUTION_HANDLER),
            ("Invocation.java", INVOCATION),
            ("MethodHeader.java", METHOD_HEADER),
            ("MethodSubstitution.java", METHOD_SUBSTITUTION),
            ("Main.java", main),
        ],
    );
    javac(&output, &output, &harness);

    let run_output = Command::new("java")
        .arg("-cp")
        .arg(&output)
        .arg("Main")
        .output()
        .unwrap();
    assert!(
        run_output.status.success(),
        "java failed:\n{}",
        String::from_utf8_lossy(&run_output.stderr)
    );
    Some(String::from_utf8(run_output.stdout).unwrap())
}

#[test]
fn logged_call_runs_the_submission_body() {
    let submission = r#"
package h00;

public class Calculater {
    static int count = 3;
    private int memroy;

    public int ad(int a, int b) {
        memroy = a - b;
        return memroy;
    }
}
"#;
    let solution = r#"
package h00;

public class Calculator {
    static int count = 5;
    private int memory;

    public int add(int a, int b) {
        memory = a + b;
        return memory;
    }
}
"#;
    let main = r#"
import gradejar.runtime.ExecutionHandler;
import h00.Calculator;

public class Main {
    public static void main(String[] args) {
        System.out.println("result " + new Calculator().add(2, 3));
        for (String entry : ExecutionHandler.getInstance().log) {
            System.out.println(entry);
        }
    }
}
"#;

    let stdout = match run_rewritten(
        &[("Calculater.java", submission)],
        &[("Calculator.java", solution)],
        main,
    ) {
        Some(stdout) => stdout,
        None => return,
    };
    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines.contains(&"result -1"), "{}", stdout);
    assert!(lines.contains(&"static h00/Calculator.count = 3"), "{}", stdout);
    assert!(lines.contains(&"call h00/Calculator.add(II)I [2, 3]"), "{}", stdout);
}

#[test]
fn substituted_constructor_routes_or_throws() {
    let submission = r#"
package h01;

public class OwnerB {
    public int value;

    public OwnerB() {
        value = 7;
    }

    public OwnerB(int value) {
        this.value = value;
    }
}
"#;
    let main = r#"
import gradejar.runtime.ExecutionHandler;
import gradejar.runtime.Invocation;
import gradejar.runtime.MethodSubstitution;
import h01.OwnerB;

public class Main {
    static MethodSubstitution routeTo(String owner, String descriptor, Object... args) {
        return new MethodSubstitution() {
            public ConstructorInvocation getConstructorInvocation() {
                return ConstructorInvocation.of(owner, descriptor, args);
            }

            public Object execute(Invocation invocation) {
                return null;
            }
        };
    }

    public static void main(String[] args) {
        ExecutionHandler handler = ExecutionHandler.getInstance();

        handler.substitute("<init>", "(I)V", routeTo("h01/OwnerB", "()V"));
        System.out.println("routed " + new OwnerB(42).value);

        handler.substitute("<init>", "(I)V", routeTo("h01/OwnerC", "(I)V", 1));
        try {
            new OwnerB(42);
            System.out.println("not thrown");
        } catch (IllegalArgumentException e) {
            System.out.println("thrown " + e.getMessage());
        }
    }
}
"#;

    let stdout = match run_rewritten(&[("OwnerB.java", submission)], &[], main) {
        Some(stdout) => stdout,
        None => return,
    };
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "routed 7",
            "thrown No constructor to route through for owner h01/OwnerC and descriptor (I)V",
        ]
    );
}
