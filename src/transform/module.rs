use super::{
    Error, MethodRewriter, RewriteKind, Settings, SolutionClassInfo, SubmissionClassInfo,
    TransformationContext,
};
use crate::header::MethodHeader;
use crate::jvm::class_file::{ClassFile, Version};
use crate::jvm::model::{Class, Field, InnerClassEntry, Method};
use crate::jvm::signatures::simple_inner_name;
use crate::jvm::{BinaryName, Name, RenderDescriptor, UnqualifiedName};
use std::collections::HashSet;

/// Rewrites all of the classes of one submission
///
/// Classes are collected first; nothing is rewritten until [`ModuleTransformer::transform`],
/// since matching needs to see every class up front.
pub struct ModuleTransformer {
    settings: Settings,
    submission: Vec<Class>,
    solution: Vec<Class>,
    library: Vec<Class>,
}

impl ModuleTransformer {
    pub fn new(settings: Settings) -> ModuleTransformer {
        ModuleTransformer {
            settings,
            submission: vec![],
            solution: vec![],
            library: vec![],
        }
    }

    /// Add a class of the submission being graded
    pub fn add_submission_class(&mut self, bytes: &[u8]) -> Result<BinaryName, Error> {
        let class = Class::from_bytes(bytes)?;
        log::debug!("Read submission class '{}'", class.name);
        let name = class.name.clone();
        self.submission.push(class);
        Ok(name)
    }

    /// Add a class of the reference solution
    pub fn add_solution_class(&mut self, bytes: &[u8]) -> Result<BinaryName, Error> {
        let class = Class::from_bytes(bytes)?;
        log::debug!("Read reference class '{}'", class.name);
        let name = class.name.clone();
        self.solution.push(class);
        Ok(name)
    }

    /// Add a class that is neither part of the submission nor the reference
    ///
    /// Library classes are only used to find out which constructors a submission superclass
    /// has.
    pub fn add_library_class(&mut self, bytes: &[u8]) -> Result<BinaryName, Error> {
        let class = Class::from_bytes(bytes)?;
        let name = class.name.clone();
        self.library.push(class);
        Ok(name)
    }

    /// Rewrite every submission class
    ///
    /// Returns one class file per submission class, under its computed name. Any error aborts
    /// the whole run, so either every class is returned or none is.
    pub fn transform(self) -> Result<Vec<(BinaryName, ClassFile)>, Error> {
        let context =
            TransformationContext::new(self.settings, self.submission, self.solution, self.library)?;

        let mut classes = vec![];
        for info in context.submission_classes() {
            let class = transform_class(&context, info)?;
            log::info!(
                "Rewrote '{}' into '{}'",
                info.original_header.name,
                class.name
            );
            classes.push((class.name.clone(), class.serialize()?));
        }
        Ok(classes)
    }
}

/// Methods of the class being assembled, keyed by name and descriptor
struct MethodTable {
    methods: Vec<Method>,
    signatures: HashSet<(UnqualifiedName, String)>,
}

impl MethodTable {
    fn new() -> MethodTable {
        MethodTable {
            methods: vec![],
            signatures: HashSet::new(),
        }
    }

    /// Add a method unless one with the same name and descriptor is already there
    fn push(&mut self, method: Method) -> bool {
        let signature = (method.name.clone(), method.descriptor.render());
        if self.signatures.insert(signature) {
            self.methods.push(method);
            true
        } else {
            false
        }
    }
}

/// Assemble a method declared with `header` around a rewritten body
fn emit_method(
    rewriter: &MethodRewriter,
    access_flags: crate::jvm::MethodAccessFlags,
) -> Result<Method, Error> {
    let header = rewriter.header;
    Ok(Method {
        access_flags,
        name: header.name.clone(),
        descriptor: header.descriptor.clone(),
        code: rewriter.rewrite()?,
        exceptions: header.exceptions.clone(),
        generic_signature: header.signature.clone(),
    })
}

fn transform_class(
    context: &TransformationContext,
    info: &SubmissionClassInfo,
) -> Result<Class, Error> {
    let solution = context.solution_for(info);
    let version = match solution {
        Some(solution) => info.class.version.max(solution.version()),
        None => info.class.version,
    };

    let computed = &info.computed_header;
    let mut class = Class::new(
        version,
        computed.access,
        computed.name.clone(),
        computed.super_name.clone(),
    );
    class.interfaces = computed.interfaces.clone();
    class.generic_signature = computed.signature.clone();
    class.source_file = info.class.source_file.clone();
    class.inner_classes = info
        .class
        .inner_classes
        .iter()
        .map(|entry| -> Result<InnerClassEntry, Error> {
            let inner_class = context.to_computed_name(&entry.inner_class)?;
            let outer_class = entry
                .outer_class
                .as_ref()
                .map(|outer| context.to_computed_name(outer))
                .transpose()?;
            let inner_name = computed_inner_name(entry, &inner_class, outer_class.as_ref())?;
            Ok(InnerClassEntry {
                inner_class,
                outer_class,
                inner_name,
                access_flags: entry.access_flags,
            })
        })
        .collect::<Result<_, _>>()?;
    class.nest_host = info
        .class
        .nest_host
        .as_ref()
        .map(|host| context.to_computed_name(host))
        .transpose()?;
    class.nest_members = info
        .class
        .nest_members
        .iter()
        .map(|member| context.to_computed_name(member))
        .collect::<Result<_, _>>()?;

    class.fields = transform_fields(context, info, solution)?;
    class.methods = transform_methods(context, info, solution, version)?;
    Ok(class)
}

/// Simple name of a member class after renaming
///
/// Anonymous classes stay anonymous, and local classes (no outer class) keep their name.
fn computed_inner_name(
    entry: &InnerClassEntry,
    inner_class: &BinaryName,
    outer_class: Option<&BinaryName>,
) -> Result<Option<UnqualifiedName>, Error> {
    let (original, outer_class) = match (&entry.inner_name, outer_class) {
        (Some(original), Some(outer_class)) => (original, outer_class),
        _ => return Ok(entry.inner_name.clone()),
    };
    if *inner_class == entry.inner_class {
        return Ok(Some(original.clone()));
    }
    let simple = simple_inner_name(outer_class, inner_class, original.as_str());
    let simple =
        UnqualifiedName::from_string(String::from(simple)).map_err(Error::MalformedName)?;
    Ok(Some(simple))
}

fn transform_fields(
    context: &TransformationContext,
    info: &SubmissionClassInfo,
    solution: Option<&SolutionClassInfo>,
) -> Result<Vec<Field>, Error> {
    let mut fields = vec![];
    for (field, mapping) in info.class.fields.iter().zip(&info.fields) {
        fields.push(Field {
            access_flags: field.access_flags,
            name: mapping.computed.name.clone(),
            descriptor: mapping.computed.descriptor.clone(),
            generic_signature: mapping.computed.signature.clone(),
            constant_value: field
                .constant_value
                .as_ref()
                .map(|constant| context.computed_constant(constant))
                .transpose()?,
        });
    }

    if let Some(solution) = solution {
        for header in &info.reference_only_fields {
            if let Some(field) = solution.field(&header.key()) {
                log::debug!("Adding reference field '{}'", header.describe());
                fields.push(field.clone());
            }
        }
    }
    Ok(fields)
}

fn transform_methods(
    context: &TransformationContext,
    info: &SubmissionClassInfo,
    solution: Option<&SolutionClassInfo>,
    version: Version,
) -> Result<Vec<Method>, Error> {
    let mut table = MethodTable::new();

    for (method, mapping) in info.class.methods.iter().zip(&info.methods) {
        let (kind, header, reference) = if method.is_static_initializer() {
            let reference = solution.and_then(SolutionClassInfo::static_initializer);
            (RewriteKind::StaticInitializer, &mapping.declared, reference)
        } else if method.is_synthetic() {
            (RewriteKind::Closure, &mapping.declared, None)
        } else {
            let reference = solution.and_then(|solution| solution.method(&mapping.computed.key()));
            (RewriteKind::Submission, &mapping.computed, reference)
        };

        let rewriter = MethodRewriter::new(
            context,
            info,
            kind,
            header,
            Some((method, &mapping.declared)),
            reference,
            version,
        );
        if !table.push(emit_method(&rewriter, method.access_flags)?) {
            log::warn!("Dropping duplicate method '{}'", header.describe());
        }

        // Calls from the submission itself still need the body in its original shape
        if rewriter.header_mismatch {
            let passthrough = MethodRewriter::new(
                context,
                info,
                RewriteKind::Closure,
                &mapping.declared,
                Some((method, &mapping.declared)),
                None,
                version,
            );
            if !table.push(emit_method(&passthrough, method.access_flags)?) {
                log::warn!(
                    "'{}' collides with another method and is dropped",
                    mapping.declared.describe()
                );
            }
        }
    }

    let solution = match solution {
        None => return Ok(table.methods),
        Some(solution) => solution,
    };

    for header in &info.reference_only_methods {
        let reference = match solution.method(&header.key()) {
            Some(reference) => reference,
            None => continue,
        };
        let rewriter = MethodRewriter::new(
            context,
            info,
            RewriteKind::Synthesized,
            header,
            None,
            Some(reference),
            version,
        );
        if !table.push(emit_method(&rewriter, reference.access_flags)?) {
            log::warn!("Reference method '{}' collides and is dropped", header.describe());
        }
    }

    if info.static_initializer().is_none() {
        if let Some(reference) = solution.static_initializer() {
            let header = MethodHeader::of(&info.computed_header.name, reference);
            let rewriter = MethodRewriter::new(
                context,
                info,
                RewriteKind::StaticInitializer,
                &header,
                None,
                Some(reference),
                version,
            );
            table.push(emit_method(&rewriter, reference.access_flags)?);
        }
    }

    for helper in solution.lambdas().chain(solution.synthetic_helpers()) {
        if !table.push(helper.clone()) {
            log::debug!("Keeping the submission's '{}'", helper.name);
        }
    }

    Ok(table.methods)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::InnerClassAccessFlags;

    fn binary(name: &str) -> BinaryName {
        BinaryName::from_string(String::from(name)).unwrap()
    }

    fn entry(inner: &str, outer: Option<&str>, name: Option<&str>) -> InnerClassEntry {
        InnerClassEntry {
            inner_class: binary(inner),
            outer_class: outer.map(binary),
            inner_name: name.map(|name| UnqualifiedName::from_string(String::from(name)).unwrap()),
            access_flags: InnerClassAccessFlags::PUBLIC | InnerClassAccessFlags::STATIC,
        }
    }

    fn simple(name: Option<UnqualifiedName>) -> Option<String> {
        name.map(|name| String::from(name.as_str()))
    }

    #[test]
    fn renamed_member_class_gets_new_simple_name() {
        let original = entry("sub/Lst$Nod", Some("sub/Lst"), Some("Nod"));
        let computed = computed_inner_name(
            &original,
            &binary("h00/List$Node"),
            Some(&binary("h00/List")),
        )
        .unwrap();
        assert_eq!(simple(computed), Some(String::from("Node")));
    }

    #[test]
    fn unrenamed_and_anonymous_classes_keep_their_names() {
        let kept = entry("sub/Lst$Nod", Some("sub/Lst"), Some("Nod"));
        let computed =
            computed_inner_name(&kept, &binary("sub/Lst$Nod"), Some(&binary("h00/List")))
                .unwrap();
        assert_eq!(simple(computed), Some(String::from("Nod")));

        let anonymous = entry("sub/Lst$1", None, None);
        let computed = computed_inner_name(&anonymous, &binary("h00/List$1"), None).unwrap();
        assert_eq!(simple(computed), None);
    }
}
