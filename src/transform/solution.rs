use crate::header::{ClassHeader, FieldHeader, MemberKey, MethodHeader};
use crate::jvm::code::{CodeElement, Instruction, MethodCode};
use crate::jvm::model::{Class, Field, Method};
use crate::jvm::references::{ConstantData, HandleMember, MethodRef};
use crate::jvm::{BinaryName, Name, RefType, RenderDescriptor, UnqualifiedName};
use std::collections::HashMap;

/// Reference class, captured so that its members can be replayed into submission classes
pub struct SolutionClassInfo {
    pub class: Class,
    pub header: ClassHeader,

    fields: HashMap<MemberKey, usize>,
    methods: HashMap<MemberKey, usize>,

    /// Lambda bodies, keyed by their name before renaming
    lambdas: HashMap<MemberKey, usize>,
}

impl SolutionClassInfo {
    /// Capture a reference class
    ///
    /// Lambda bodies get `suffix` appended to their names, and every reference to them inside
    /// the class (direct calls and method handles passed to `invokedynamic` bootstraps) follows.
    pub fn new(mut class: Class, suffix: &UnqualifiedName) -> SolutionClassInfo {
        let mut renames: HashMap<MemberKey, UnqualifiedName> = HashMap::new();
        for method in &class.methods {
            if method.is_synthetic() && method.name.as_str().starts_with("lambda$") {
                let key = MethodHeader::of(&class.name, method).key();
                renames.insert(key, method.name.concat(suffix));
            }
        }

        let mut lambdas = HashMap::new();
        if !renames.is_empty() {
            for (idx, method) in class.methods.iter_mut().enumerate() {
                let key = MemberKey {
                    owner: class.name.clone(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.render(),
                };
                if let Some(renamed) = renames.get(&key) {
                    log::debug!("Renaming reference lambda '{}' to '{}'", method.name, renamed);
                    method.name = renamed.clone();
                    lambdas.insert(key, idx);
                }
                if let Some(code) = method.code.as_mut() {
                    rename_lambda_references(code, &class.name, &renames);
                }
            }
        }

        let fields = class
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| (FieldHeader::of(&class.name, field).key(), idx))
            .collect();
        let methods = class
            .methods
            .iter()
            .enumerate()
            .map(|(idx, method)| (MethodHeader::of(&class.name, method).key(), idx))
            .collect();

        SolutionClassInfo {
            header: ClassHeader::of(&class),
            class,
            fields,
            methods,
            lambdas,
        }
    }

    pub fn name(&self) -> &BinaryName {
        &self.header.name
    }

    pub fn version(&self) -> crate::jvm::class_file::Version {
        self.class.version
    }

    /// Headers of the fields that submission fields can be matched against
    pub fn field_headers(&self) -> Vec<FieldHeader> {
        self.class
            .fields
            .iter()
            .map(|field| FieldHeader::of(&self.class.name, field))
            .collect()
    }

    /// Headers of the methods that submission methods can be matched against
    ///
    /// Compiler generated methods and the static initializer are left out.
    pub fn method_headers(&self) -> impl Iterator<Item = MethodHeader> + '_ {
        self.class
            .methods
            .iter()
            .filter(|method| !method.is_synthetic() && !method.is_static_initializer())
            .map(|method| MethodHeader::of(&self.class.name, method))
    }

    pub fn field(&self, key: &MemberKey) -> Option<&Field> {
        self.fields.get(key).map(|idx| &self.class.fields[*idx])
    }

    /// Method by its key (renamed lambdas are found under their new name)
    pub fn method(&self, key: &MemberKey) -> Option<&Method> {
        self.methods.get(key).map(|idx| &self.class.methods[*idx])
    }

    pub fn static_initializer(&self) -> Option<&Method> {
        self.class
            .methods
            .iter()
            .find(|method| method.is_static_initializer())
    }

    /// Renamed lambda bodies
    pub fn lambdas(&self) -> impl Iterator<Item = &Method> + '_ {
        let mut indices: Vec<usize> = self.lambdas.values().copied().collect();
        indices.sort_unstable();
        indices.into_iter().map(move |idx| &self.class.methods[idx])
    }

    /// Compiler generated methods other than lambda bodies (bridges, accessors, enum helpers)
    pub fn synthetic_helpers(&self) -> impl Iterator<Item = &Method> + '_ {
        self.class.methods.iter().enumerate().filter_map(move |(idx, method)| {
            let is_lambda = self.lambdas.values().any(|lambda| *lambda == idx);
            if method.is_synthetic() && !is_lambda {
                Some(method)
            } else {
                None
            }
        })
    }
}

/// Point every reference to a renamed lambda at its new name
fn rename_lambda_references(
    code: &mut MethodCode,
    this_class: &BinaryName,
    renames: &HashMap<MemberKey, UnqualifiedName>,
) {
    let rename_method = |method: &mut MethodRef| {
        if let RefType::Object(owner) = &method.class {
            if owner == this_class {
                let key = MemberKey {
                    owner: owner.clone(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.render(),
                };
                if let Some(renamed) = renames.get(&key) {
                    method.name = renamed.clone();
                }
            }
        }
    };

    fn rename_constant(constant: &mut ConstantData, rename_method: &impl Fn(&mut MethodRef)) {
        match constant {
            ConstantData::MethodHandle(handle) => {
                if let HandleMember::Method(method) = &mut handle.member {
                    rename_method(method);
                }
            }
            ConstantData::Dynamic(dynamic) => {
                for argument in &mut dynamic.bootstrap.arguments {
                    rename_constant(argument, rename_method);
                }
            }
            _ => (),
        }
    }

    for element in &mut code.elements {
        if let CodeElement::Instruction(insn) = element {
            match insn {
                Instruction::Invoke(_, method) => rename_method(method),
                Instruction::InvokeDynamic(call_site) => {
                    for argument in &mut call_site.bootstrap.arguments {
                        rename_constant(argument, &rename_method);
                    }
                }
                Instruction::Ldc(constant) | Instruction::Ldc2(constant) => {
                    rename_constant(constant, &rename_method)
                }
                _ => (),
            }
        }
    }
}
