use super::{Error, Settings, SolutionClassInfo, SubmissionClassInfo};
use crate::header::{ClassHeader, MemberKey, MethodHeader};
use crate::jvm::model::Class;
use crate::jvm::references::{
    BootstrapMethodData, CallSite, ConstantData, DynamicConstant, FieldRef, HandleMember,
    MethodHandle, MethodRef,
};
use crate::jvm::signatures::map_signature_classes;
use crate::jvm::{
    BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, Name, RefType, RenderDescriptor,
    UnqualifiedName,
};
use crate::matching;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Mapping of submission class names onto their computed names
///
/// Submission classes matched with a reference class take the name of that reference class.
/// Unmatched submission classes, reference classes, and library classes keep their names.
#[derive(Debug)]
pub struct TypeMapping {
    /// Submission class name to computed class name
    classes: BTreeMap<BinaryName, BinaryName>,

    /// Names of reference classes
    solution_classes: BTreeSet<BinaryName>,

    /// Packages containing submission classes
    graded_packages: BTreeSet<String>,
}

impl TypeMapping {
    pub fn new(
        classes: BTreeMap<BinaryName, BinaryName>,
        solution_classes: BTreeSet<BinaryName>,
    ) -> TypeMapping {
        let graded_packages = classes
            .keys()
            .map(|name| name.package().to_owned())
            .collect();
        TypeMapping {
            classes,
            solution_classes,
            graded_packages,
        }
    }

    /// Is this a class that gets rewritten (or would be, if it existed)?
    pub fn is_submission_type(&self, name: &BinaryName) -> bool {
        self.classes.contains_key(name) || self.graded_packages.contains(name.package())
    }

    pub fn is_solution_type(&self, name: &BinaryName) -> bool {
        self.solution_classes.contains(name)
    }

    /// Submission classes, keyed by original name
    pub fn submission_classes(&self) -> impl Iterator<Item = (&BinaryName, &BinaryName)> {
        self.classes.iter()
    }

    /// Computed name of a class
    ///
    /// Fails for classes in graded packages that are neither submission nor reference classes:
    /// those can't be resolved at runtime.
    pub fn computed_name(&self, name: &BinaryName) -> Result<BinaryName, Error> {
        if let Some(computed) = self.classes.get(name) {
            Ok(computed.clone())
        } else if self.solution_classes.contains(name) || !self.is_submission_type(name) {
            Ok(name.clone())
        } else {
            Err(Error::MissingTypeMapping(name.clone()))
        }
    }

    pub fn computed_ref_type(&self, ref_type: &RefType<BinaryName>) -> Result<RefType<BinaryName>, Error> {
        ref_type.try_map(|name| self.computed_name(name))
    }

    pub fn computed_field_type(
        &self,
        field_type: &FieldType<BinaryName>,
    ) -> Result<FieldType<BinaryName>, Error> {
        field_type.try_map(|name| self.computed_name(name))
    }

    pub fn computed_descriptor(
        &self,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Result<MethodDescriptor<BinaryName>, Error> {
        descriptor.try_map(|name| self.computed_name(name))
    }

    /// Computed form of a class, method, or field generic signature
    pub fn computed_signature(&self, signature: &str) -> Result<String, Error> {
        map_signature_classes(signature, |name| self.computed_name(name))
    }

    pub fn computed_class_header(&self, header: &ClassHeader) -> Result<ClassHeader, Error> {
        Ok(ClassHeader {
            access: header.access,
            name: self.computed_name(&header.name)?,
            signature: self.computed_optional_signature(header.signature.as_deref())?,
            super_name: header
                .super_name
                .as_ref()
                .map(|name| self.computed_name(name))
                .transpose()?,
            interfaces: header
                .interfaces
                .iter()
                .map(|name| self.computed_name(name))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn computed_optional_signature(&self, signature: Option<&str>) -> Result<Option<String>, Error> {
        signature
            .map(|signature| self.computed_signature(signature))
            .transpose()
    }
}

/// Everything known about one run, built up front and only read while rewriting
pub struct TransformationContext {
    pub settings: Settings,
    types: TypeMapping,

    /// Submission classes, keyed by original name
    submission: BTreeMap<BinaryName, SubmissionClassInfo>,

    /// Reference classes, keyed by name
    solution: BTreeMap<BinaryName, SolutionClassInfo>,

    /// Constructors of classes outside the submission and the reference
    library_constructors: HashMap<BinaryName, Vec<MethodHeader>>,
}

impl TransformationContext {
    /// Match the submission against the reference and prepare all of the per-class information
    pub fn new(
        settings: Settings,
        submission: Vec<Class>,
        solution: Vec<Class>,
        library: Vec<Class>,
    ) -> Result<TransformationContext, Error> {
        Settings::checked_threshold(settings.similarity_threshold)?;
        let mut solution_infos: BTreeMap<BinaryName, SolutionClassInfo> = BTreeMap::new();
        for class in solution {
            let name = class.name.clone();
            let info = SolutionClassInfo::new(class, &settings.solution_lambda_suffix);
            if solution_infos.insert(name.clone(), info).is_some() {
                return Err(Error::DuplicateClass(name));
            }
        }

        let submission_headers: Vec<ClassHeader> = submission.iter().map(ClassHeader::of).collect();
        let solution_headers: Vec<ClassHeader> =
            solution_infos.values().map(|info| info.header.clone()).collect();
        let matched = matching::map_classes(
            &submission_headers,
            &solution_headers,
            settings.similarity_threshold,
        );

        let mut classes = BTreeMap::new();
        for header in &submission_headers {
            let computed = matched.get(&header.name).unwrap_or(&header.name).clone();
            log::debug!("Class '{}' becomes '{}'", header.name, computed);
            if classes.insert(header.name.clone(), computed).is_some() {
                return Err(Error::DuplicateClass(header.name.clone()));
            }
        }
        let types = TypeMapping::new(classes, solution_infos.keys().cloned().collect());

        let mut submission_infos = BTreeMap::new();
        for class in submission {
            let solution_info = matched
                .get(&class.name)
                .and_then(|solution_name| solution_infos.get(solution_name));
            let info = SubmissionClassInfo::new(
                class,
                solution_info,
                &types,
                settings.similarity_threshold,
            )?;
            submission_infos.insert(info.original_header.name.clone(), info);
        }

        let mut library_constructors = HashMap::new();
        for class in library {
            let constructors = class
                .methods
                .iter()
                .filter(|method| method.is_constructor() && !method.is_synthetic())
                .map(|method| MethodHeader::of(&class.name, method))
                .collect();
            library_constructors.insert(class.name.clone(), constructors);
        }

        Ok(TransformationContext {
            settings,
            types,
            submission: submission_infos,
            solution: solution_infos,
            library_constructors,
        })
    }

    pub fn submission_classes(&self) -> impl Iterator<Item = &SubmissionClassInfo> {
        self.submission.values()
    }

    pub fn submission_class(&self, original_name: &BinaryName) -> Option<&SubmissionClassInfo> {
        self.submission.get(original_name)
    }

    /// Reference class paired with a submission class
    pub fn solution_for(&self, info: &SubmissionClassInfo) -> Option<&SolutionClassInfo> {
        info.solution_name
            .as_ref()
            .and_then(|name| self.solution.get(name))
    }

    /// Submission class whose computed name is this one
    fn submission_by_computed_name(&self, computed: &BinaryName) -> Option<&SubmissionClassInfo> {
        self.submission
            .values()
            .find(|info| info.computed_header.name == *computed)
    }

    /// Submission class with this original name, followed by its submission superclasses
    fn submission_hierarchy<'a>(
        &'a self,
        original_name: &BinaryName,
    ) -> impl Iterator<Item = &'a SubmissionClassInfo> + 'a {
        std::iter::successors(self.submission.get(original_name), move |info| {
            info.original_header
                .super_name
                .as_ref()
                .and_then(|super_name| self.submission.get(super_name))
        })
        .take(self.submission.len())
    }

    pub fn is_submission_type(&self, name: &BinaryName) -> bool {
        self.types.is_submission_type(name)
    }

    pub fn to_computed_name(&self, name: &BinaryName) -> Result<BinaryName, Error> {
        self.types.computed_name(name)
    }

    pub fn to_computed_ref_type(
        &self,
        ref_type: &RefType<BinaryName>,
    ) -> Result<RefType<BinaryName>, Error> {
        self.types.computed_ref_type(ref_type)
    }

    pub fn to_computed_field_type(
        &self,
        field_type: &FieldType<BinaryName>,
    ) -> Result<FieldType<BinaryName>, Error> {
        self.types.computed_field_type(field_type)
    }

    pub fn to_computed_descriptor(
        &self,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Result<MethodDescriptor<BinaryName>, Error> {
        self.types.computed_descriptor(descriptor)
    }

    pub fn to_computed_signature(&self, signature: &str) -> Result<String, Error> {
        self.types.computed_signature(signature)
    }

    /// Does a call to this method get redirected to a replacement?
    pub fn method_has_replacement(&self, key: &MemberKey) -> bool {
        self.settings.replacements.contains_key(key)
    }

    pub fn get_replacement(&self, key: &MemberKey) -> Option<&MethodRef> {
        self.settings.replacements.get(key)
    }

    /// Translate a field reference from submission code
    pub fn computed_field(&self, field: &FieldRef) -> Result<FieldRef, Error> {
        let class = self.to_computed_name(&field.class)?;
        for info in self.submission_hierarchy(&field.class) {
            let key = MemberKey {
                owner: info.original_header.name.clone(),
                name: field.name.clone(),
                descriptor: field.descriptor.render(),
            };
            if let Some(computed) = info.computed_field(&key) {
                return Ok(FieldRef {
                    class,
                    name: computed.name.clone(),
                    descriptor: computed.descriptor.clone(),
                });
            }
        }

        Ok(FieldRef {
            class,
            name: field.name.clone(),
            descriptor: self.to_computed_field_type(&field.descriptor)?,
        })
    }

    /// Translate a method reference from submission code
    pub fn computed_method(&self, method: &MethodRef) -> Result<MethodRef, Error> {
        let class = self.to_computed_ref_type(&method.class)?;
        if let RefType::Object(owner) = &method.class {
            for info in self.submission_hierarchy(owner) {
                let key = MemberKey {
                    owner: info.original_header.name.clone(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.render(),
                };
                if let Some(computed) = info.computed_call_target(&key) {
                    return Ok(MethodRef {
                        class,
                        name: computed.name.clone(),
                        descriptor: computed.descriptor.clone(),
                        is_interface: method.is_interface,
                    });
                }
            }
        }

        Ok(MethodRef {
            class,
            name: method.name.clone(),
            descriptor: self.to_computed_descriptor(&method.descriptor)?,
            is_interface: method.is_interface,
        })
    }

    pub fn computed_method_handle(&self, handle: &MethodHandle) -> Result<MethodHandle, Error> {
        Ok(MethodHandle {
            kind: handle.kind,
            member: match &handle.member {
                HandleMember::Field(field) => HandleMember::Field(self.computed_field(field)?),
                HandleMember::Method(method) => HandleMember::Method(self.computed_method(method)?),
            },
        })
    }

    pub fn computed_constant(&self, constant: &ConstantData) -> Result<ConstantData, Error> {
        Ok(match constant {
            ConstantData::Class(class) => ConstantData::Class(self.to_computed_ref_type(class)?),
            ConstantData::MethodType(descriptor) => {
                ConstantData::MethodType(self.to_computed_descriptor(descriptor)?)
            }
            ConstantData::MethodHandle(handle) => {
                ConstantData::MethodHandle(self.computed_method_handle(handle)?)
            }
            ConstantData::Dynamic(dynamic) => ConstantData::Dynamic(Box::new(DynamicConstant {
                name: dynamic.name.clone(),
                descriptor: self.to_computed_field_type(&dynamic.descriptor)?,
                bootstrap: self.computed_bootstrap(&dynamic.bootstrap)?,
            })),
            other => other.clone(),
        })
    }

    fn computed_bootstrap(&self, bootstrap: &BootstrapMethodData) -> Result<BootstrapMethodData, Error> {
        Ok(BootstrapMethodData {
            method: self.computed_method_handle(&bootstrap.method)?,
            arguments: bootstrap
                .arguments
                .iter()
                .map(|argument| self.computed_constant(argument))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn computed_call_site(&self, call_site: &CallSite) -> Result<CallSite, Error> {
        Ok(CallSite {
            name: call_site.name.clone(),
            descriptor: self.to_computed_descriptor(&call_site.descriptor)?,
            bootstrap: self.computed_bootstrap(&call_site.bootstrap)?,
        })
    }

    /// Constructors a constructor substitution may route through
    ///
    /// These are the constructors of the (computed) superclass followed by the other
    /// constructors of the class itself, all in computed form.
    pub fn constructor_candidates(
        &self,
        info: &SubmissionClassInfo,
        excluding: &MemberKey,
    ) -> Vec<MethodHeader> {
        let mut candidates = match &info.computed_header.super_name {
            None => vec![],
            Some(super_name) => self.constructors_of(super_name),
        };
        candidates.extend(
            info.computed_constructors()
                .filter(|header| header.key() != *excluding)
                .cloned(),
        );
        candidates
    }

    /// Constructors of a class, given its computed name
    fn constructors_of(&self, computed: &BinaryName) -> Vec<MethodHeader> {
        if let Some(info) = self.submission_by_computed_name(computed) {
            info.computed_constructors().cloned().collect()
        } else if let Some(info) = self.solution.get(computed) {
            info.method_headers()
                .filter(|header| header.is_constructor())
                .collect()
        } else if let Some(constructors) = self.library_constructors.get(computed) {
            constructors.clone()
        } else if *computed == BinaryName::OBJECT {
            vec![MethodHeader {
                owner: BinaryName::OBJECT,
                access: MethodAccessFlags::PUBLIC,
                name: UnqualifiedName::INIT,
                descriptor: MethodDescriptor {
                    parameters: vec![],
                    return_type: None,
                },
                signature: None,
                exceptions: vec![],
            }]
        } else {
            log::warn!("Constructors of '{}' are unknown", computed.as_str());
            vec![]
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    fn mapping() -> TypeMapping {
        let mut classes = BTreeMap::new();
        classes.insert(name("h00/Calculater"), name("h00/Calculator"));
        classes.insert(name("h00/Helper"), name("h00/Helper"));
        let solution = [name("h00/Calculator"), name("h00/Shape")].into_iter().collect();
        TypeMapping::new(classes, solution)
    }

    #[test]
    fn arrays_are_mapped_structurally() {
        let types = mapping();
        let array = FieldType::array(FieldType::array(FieldType::object(name("h00/Calculater"))));
        let computed = types.computed_field_type(&array).unwrap();
        assert_eq!(computed.render(), "[[Lh00/Calculator;");

        let descriptor = MethodDescriptor::<BinaryName>::parse("([Lh00/Calculater;I)Lh00/Helper;")
            .unwrap();
        assert_eq!(
            types.computed_descriptor(&descriptor).unwrap().render(),
            "([Lh00/Calculator;I)Lh00/Helper;"
        );
    }

    #[test]
    fn computing_is_idempotent() {
        let types = mapping();
        for original in ["h00/Calculater", "h00/Helper", "h00/Shape", "java/util/List"] {
            let once = types.computed_name(&name(original)).unwrap();
            let twice = types.computed_name(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn library_types_pass_through() {
        let types = mapping();
        assert!(!types.is_submission_type(&name("java/util/List")));
        assert_eq!(
            types.computed_name(&name("java/util/List")).unwrap(),
            name("java/util/List")
        );
    }

    #[test]
    fn unknown_graded_types_are_fatal() {
        let types = mapping();
        assert!(types.is_submission_type(&name("h00/Missing")));
        match types.computed_name(&name("h00/Missing")) {
            Err(Error::MissingTypeMapping(missing)) => assert_eq!(missing, name("h00/Missing")),
            other => panic!("expected a missing type mapping, got {:?}", other),
        }
    }

    #[test]
    fn signatures_are_mapped() {
        let types = mapping();
        let signature = "<T:Ljava/lang/Object;>(Ljava/util/List<Lh00/Calculater;>;TT;)V";
        assert_eq!(
            types.computed_signature(signature).unwrap(),
            "<T:Ljava/lang/Object;>(Ljava/util/List<Lh00/Calculator;>;TT;)V"
        );
    }

    #[test]
    fn solution_classes_are_known() {
        let types = mapping();
        assert!(types.is_solution_type(&name("h00/Shape")));
        assert!(!types.is_solution_type(&name("h00/Calculater")));
        let originals: Vec<_> = types
            .submission_classes()
            .map(|(original, _)| original.clone())
            .collect();
        assert_eq!(originals, vec![name("h00/Calculater"), name("h00/Helper")]);
    }

    #[test]
    fn replacements_are_looked_up_by_member() {
        let mut settings = Settings::new().unwrap();
        let original = MemberKey {
            owner: name("java/lang/Math"),
            name: UnqualifiedName::from_string(String::from("abs")).unwrap(),
            descriptor: String::from("(I)I"),
        };
        let replacement = MethodRef::new(
            name("grading/Replacements"),
            UnqualifiedName::from_string(String::from("abs")).unwrap(),
            MethodDescriptor::parse("(I)I").unwrap(),
        );
        settings.add_replacement(original.clone(), replacement.clone());

        let context = TransformationContext::new(settings, vec![], vec![], vec![]).unwrap();
        assert!(context.method_has_replacement(&original));
        assert_eq!(context.get_replacement(&original), Some(&replacement));

        let other = MemberKey {
            descriptor: String::from("(J)J"),
            ..original
        };
        assert!(!context.method_has_replacement(&other));
    }
}
