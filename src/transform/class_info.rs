use super::context::TypeMapping;
use super::rewriter::header_mismatch;
use super::{Error, SolutionClassInfo};
use crate::header::{ClassHeader, FieldHeader, MemberKey, MethodHeader};
use crate::jvm::model::{Class, Method};
use crate::jvm::{BinaryName, FieldType, Name};
use crate::matching;
use std::collections::{HashMap, HashSet};

/// Where a submission field ends up
#[derive(Clone, Debug)]
pub struct FieldMapping {
    /// Field as the submission declares it
    pub original: FieldHeader,

    /// Field as it is declared in the rewritten class
    pub computed: FieldHeader,
}

/// Where a submission method ends up
#[derive(Clone, Debug)]
pub struct MethodMapping {
    /// Method as the submission declares it
    pub original: MethodHeader,

    /// Submission method with its types translated, but still under its own name
    pub declared: MethodHeader,

    /// Method as it is declared in the rewritten class
    ///
    /// This is the paired reference header, or `declared` for unpaired methods.
    pub computed: MethodHeader,

    /// Paired with a reference method of a different shape
    pub header_mismatch: bool,
}

impl MethodMapping {
    /// Header that calls from submission code should target
    ///
    /// Calls to mismatched methods keep going to the submission body, since their arguments
    /// have the shape of the submission declaration.
    pub fn call_target(&self) -> &MethodHeader {
        if self.header_mismatch {
            &self.declared
        } else {
            &self.computed
        }
    }
}

/// Submission class along with everything matching found out about it
pub struct SubmissionClassInfo {
    pub class: Class,
    pub original_header: ClassHeader,
    pub computed_header: ClassHeader,

    /// Reference class this one was paired with
    pub solution_name: Option<BinaryName>,

    pub fields: Vec<FieldMapping>,
    pub methods: Vec<MethodMapping>,

    /// Reference fields no submission field was paired with
    pub reference_only_fields: Vec<FieldHeader>,

    /// Reference methods no submission method was paired with
    pub reference_only_methods: Vec<MethodHeader>,

    field_index: HashMap<MemberKey, usize>,
    method_index: HashMap<MemberKey, usize>,
}

impl SubmissionClassInfo {
    pub fn new(
        class: Class,
        solution: Option<&SolutionClassInfo>,
        types: &TypeMapping,
        threshold: f64,
    ) -> Result<SubmissionClassInfo, Error> {
        let original_header = ClassHeader::of(&class);
        let computed_header = types.computed_class_header(&original_header)?;
        let owner = computed_header.name.clone();

        let original_fields: Vec<FieldHeader> = class
            .fields
            .iter()
            .map(|field| FieldHeader::of(&class.name, field))
            .collect();
        let original_methods: Vec<MethodHeader> = class
            .methods
            .iter()
            .map(|method| MethodHeader::of(&class.name, method))
            .collect();

        let (matched_fields, matched_methods, solution_fields, solution_methods) = match solution {
            None => (HashMap::new(), HashMap::new(), vec![], vec![]),
            Some(solution) => {
                let solution_fields = solution.field_headers();
                let solution_methods: Vec<MethodHeader> = solution.method_headers().collect();
                let matchable: Vec<MethodHeader> = class
                    .methods
                    .iter()
                    .zip(&original_methods)
                    .filter(|(method, _)| is_matchable(method))
                    .map(|(_, header)| header.clone())
                    .collect();

                let fields = matching::map_fields(
                    &original_fields,
                    &solution_fields,
                    threshold,
                    |field_type| types.computed_field_type(field_type),
                )?;
                let methods = matching::map_methods(
                    &matchable,
                    &solution_methods,
                    threshold,
                    |descriptor| types.computed_descriptor(descriptor),
                )?;
                (fields, methods, solution_fields, solution_methods)
            }
        };

        let mut fields = Vec::with_capacity(original_fields.len());
        for original in original_fields {
            let computed = match matched_fields.get(&original.key()) {
                Some(computed) => computed.clone(),
                None => FieldHeader {
                    owner: owner.clone(),
                    access: original.access,
                    name: original.name.clone(),
                    descriptor: types.computed_field_type(&original.descriptor)?,
                    signature: types.computed_optional_signature(original.signature.as_deref())?,
                },
            };
            fields.push(FieldMapping { original, computed });
        }

        let mut methods = Vec::with_capacity(original_methods.len());
        for original in original_methods {
            let declared = MethodHeader {
                owner: owner.clone(),
                access: original.access,
                name: original.name.clone(),
                descriptor: types.computed_descriptor(&original.descriptor)?,
                signature: types.computed_optional_signature(original.signature.as_deref())?,
                exceptions: original
                    .exceptions
                    .iter()
                    .map(|exception| types.computed_name(exception))
                    .collect::<Result<_, _>>()?,
            };
            let (computed, mismatch) = match matched_methods.get(&original.key()) {
                Some(computed) => {
                    let mismatch = header_mismatch(&original.descriptor, &computed.descriptor);
                    if mismatch {
                        log::warn!(
                            "'{}' has a different shape than '{}'",
                            original.describe(),
                            computed.describe()
                        );
                    }
                    (computed.clone(), mismatch)
                }
                None => (declared.clone(), false),
            };
            methods.push(MethodMapping {
                original,
                declared,
                computed,
                header_mismatch: mismatch,
            });
        }

        let paired_fields: HashSet<MemberKey> =
            fields.iter().map(|field| field.computed.key()).collect();
        let reference_only_fields = solution_fields
            .into_iter()
            .filter(|field| !paired_fields.contains(&field.key()))
            .collect();

        let paired_methods: HashSet<MemberKey> = matched_methods
            .values()
            .map(|method| method.key())
            .collect();
        let reference_only_methods: Vec<MethodHeader> = solution_methods
            .into_iter()
            .filter(|method| !paired_methods.contains(&method.key()))
            .collect();
        for method in &reference_only_methods {
            log::debug!("'{}' is only in the reference", method.describe());
        }

        let field_index = fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.original.key(), idx))
            .collect();
        let method_index = methods
            .iter()
            .enumerate()
            .map(|(idx, method)| (method.original.key(), idx))
            .collect();

        Ok(SubmissionClassInfo {
            class,
            original_header,
            computed_header,
            solution_name: solution.map(|solution| solution.name().clone()),
            fields,
            methods,
            reference_only_fields,
            reference_only_methods,
            field_index,
            method_index,
        })
    }

    /// Computed form of a field this class declares, keyed by its original identity
    pub fn computed_field(&self, key: &MemberKey) -> Option<&FieldHeader> {
        self.field_index
            .get(key)
            .map(|idx| &self.fields[*idx].computed)
    }

    /// Method mapping of a method this class declares, keyed by its original identity
    pub fn method_mapping(&self, key: &MemberKey) -> Option<&MethodMapping> {
        self.method_index.get(key).map(|idx| &self.methods[*idx])
    }

    /// Header that calls to a method of this class from submission code should target
    pub fn computed_call_target(&self, key: &MemberKey) -> Option<&MethodHeader> {
        self.method_mapping(key).map(MethodMapping::call_target)
    }

    /// Every constructor the rewritten class will declare, in computed form
    pub fn computed_constructors(&self) -> impl Iterator<Item = &MethodHeader> + '_ {
        self.methods
            .iter()
            .filter(|method| method.original.is_constructor())
            .map(|method| &method.computed)
            .chain(
                self.reference_only_methods
                    .iter()
                    .filter(|method| method.is_constructor()),
            )
    }

    /// Is this (computed) field one that the submission declares?
    ///
    /// Reference-only fields are not.
    pub fn declares_computed_field(&self, name: &str, descriptor: &FieldType<BinaryName>) -> bool {
        self.fields.iter().any(|field| {
            field.computed.name.as_str() == name && field.computed.descriptor == *descriptor
        })
    }

    /// Static initializer of the submission class
    pub fn static_initializer(&self) -> Option<&Method> {
        self.class
            .methods
            .iter()
            .find(|method| method.is_static_initializer())
    }
}

/// Methods that take part in matching: compiler generated ones and `<clinit>` are handled
/// separately
fn is_matchable(method: &Method) -> bool {
    !method.is_synthetic() && !method.is_static_initializer()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::model::Field;
    use crate::jvm::{
        ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, MethodDescriptor, UnqualifiedName,
    };
    use crate::transform::Settings;
    use std::collections::{BTreeMap, BTreeSet};

    fn binary(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn unqualified(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(name.to_owned()).unwrap()
    }

    fn class(name: &str) -> Class {
        Class::new(
            Version::JAVA8,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            binary(name),
            Some(BinaryName::OBJECT),
        )
    }

    fn method(name: &str, parameters: Vec<FieldType<BinaryName>>, ret: Option<FieldType<BinaryName>>) -> Method {
        Method::new(
            MethodAccessFlags::PUBLIC,
            unqualified(name),
            MethodDescriptor {
                parameters,
                return_type: ret,
            },
        )
    }

    fn types() -> TypeMapping {
        let mut classes = BTreeMap::new();
        classes.insert(binary("sub/Calculater"), binary("h00/Calculator"));
        let solution: BTreeSet<BinaryName> = [binary("h00/Calculator")].into_iter().collect();
        TypeMapping::new(classes, solution)
    }

    fn solution() -> SolutionClassInfo {
        let mut reference = class("h00/Calculator");
        reference.fields.push(Field::new(
            FieldAccessFlags::PRIVATE,
            unqualified("memory"),
            FieldType::double(),
        ));
        reference.fields.push(Field::new(
            FieldAccessFlags::PRIVATE,
            unqualified("history"),
            FieldType::array(FieldType::double()),
        ));
        reference
            .methods
            .push(method("add", vec![FieldType::int(), FieldType::int()], Some(FieldType::int())));
        reference
            .methods
            .push(method("reset", vec![], None));
        let settings = Settings::new().unwrap();
        SolutionClassInfo::new(reference, &settings.solution_lambda_suffix)
    }

    #[test]
    fn members_are_paired_and_renamed() {
        let mut submission = class("sub/Calculater");
        submission.fields.push(Field::new(
            FieldAccessFlags::PRIVATE,
            unqualified("memroy"),
            FieldType::double(),
        ));
        submission
            .methods
            .push(method("ad", vec![FieldType::int(), FieldType::int()], Some(FieldType::int())));
        let solution = solution();

        let info = SubmissionClassInfo::new(submission, Some(&solution), &types(), 0.5).unwrap();
        assert_eq!(info.computed_header.name, binary("h00/Calculator"));
        assert_eq!(info.solution_name, Some(binary("h00/Calculator")));

        let field_key = info.fields[0].original.key();
        assert_eq!(info.computed_field(&field_key).unwrap().name.as_str(), "memory");

        let method_key = info.methods[0].original.key();
        let target = info.computed_call_target(&method_key).unwrap();
        assert_eq!(target.name.as_str(), "add");
        assert!(!info.methods[0].header_mismatch);

        let only_fields: Vec<&str> = info
            .reference_only_fields
            .iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(only_fields, vec!["history"]);
        let only_methods: Vec<&str> = info
            .reference_only_methods
            .iter()
            .map(|method| method.name.as_str())
            .collect();
        assert_eq!(only_methods, vec!["reset"]);
    }

    #[test]
    fn mismatched_methods_keep_their_own_call_target() {
        let mut submission = class("sub/Calculater");
        submission.methods.push(method(
            "add",
            vec![FieldType::long(), FieldType::int()],
            Some(FieldType::int()),
        ));
        let solution = solution();

        let info = SubmissionClassInfo::new(submission, Some(&solution), &types(), 0.5).unwrap();
        let mapping = &info.methods[0];
        assert!(mapping.header_mismatch);
        assert_eq!(mapping.computed.descriptor.parameters[0], FieldType::int());
        assert_eq!(mapping.call_target().descriptor.parameters[0], FieldType::long());
        assert_eq!(mapping.call_target().owner, binary("h00/Calculator"));
    }

    #[test]
    fn unpaired_classes_keep_their_members() {
        let mut classes = BTreeMap::new();
        classes.insert(binary("sub/Helper"), binary("sub/Helper"));
        let types = TypeMapping::new(classes, BTreeSet::new());

        let mut submission = class("sub/Helper");
        submission.methods.push(method("help", vec![], None));
        let info = SubmissionClassInfo::new(submission, None, &types, 0.5).unwrap();
        assert!(info.solution_name.is_none());
        assert_eq!(info.methods[0].computed.name.as_str(), "help");
        assert!(info.reference_only_methods.is_empty());
    }
}
