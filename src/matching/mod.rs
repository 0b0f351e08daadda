//! Fuzzy matching of submission declarations onto reference declarations
//!
//! Learners rename things and make typos, so the classes, fields and methods of a submission
//! are paired up with those of the reference solution by name similarity rather than by exact
//! name. Structural preconditions (static-ness, interface-ness, matching descriptors) are hard
//! gates: a pair failing one scores 0 no matter how close the names are.

mod mapper;
mod similarity;

pub use mapper::*;
pub use similarity::*;

use crate::header::{ClassHeader, FieldHeader, MemberKey, MethodHeader};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name};
use std::collections::{BTreeMap, HashMap};

/// Pair submission classes with reference classes
///
/// Only the simple names (package stripped) are compared, and classes only match other classes
/// of the same interface-ness. Returns a map from submission class name to reference class name.
pub fn map_classes(
    submission: &[ClassHeader],
    solution: &[ClassHeader],
    threshold: f64,
) -> BTreeMap<BinaryName, BinaryName> {
    let mapper = SimilarityMapper::new(submission, solution, threshold, |sub, sol| {
        if sub.is_interface() != sol.is_interface() {
            0.0
        } else {
            name_similarity(sub.name.simple_name(), sol.name.simple_name())
        }
    });

    for unmatched in mapper.unmatched_rows() {
        log::warn!("No reference class matches '{}'", unmatched.name.as_str());
    }

    mapper
        .matches()
        .map(|(sub, sol)| (sub.name.clone(), sol.name.clone()))
        .collect()
}

/// Pair submission fields with reference fields of one class
///
/// `translate` turns a submission descriptor into its computed form; it must then be exactly
/// equal to the reference descriptor. Returns a map from submission member to reference header.
pub fn map_fields<E>(
    submission: &[FieldHeader],
    solution: &[FieldHeader],
    threshold: f64,
    mut translate: impl FnMut(&FieldType<BinaryName>) -> Result<FieldType<BinaryName>, E>,
) -> Result<HashMap<MemberKey, FieldHeader>, E> {
    let translated = submission
        .iter()
        .map(|field| Ok((field, translate(&field.descriptor)?)))
        .collect::<Result<Vec<_>, E>>()?;

    let mapper = SimilarityMapper::new(&translated, solution, threshold, |(sub, desc), sol| {
        if sub.is_static() != sol.is_static() || *desc != sol.descriptor {
            0.0
        } else {
            name_similarity(sub.name.as_str(), sol.name.as_str())
        }
    });

    Ok(mapper
        .matches()
        .map(|((sub, _), sol)| (sub.key(), sol.clone()))
        .collect())
}

/// Pair submission methods with reference methods of one class
///
/// The first pass only pairs methods whose translated descriptor equals the reference
/// descriptor. A second pass over what is left only requires the same static-ness,
/// constructor-ness and parameter count; those pairs may have incompatible descriptors.
pub fn map_methods<E>(
    submission: &[MethodHeader],
    solution: &[MethodHeader],
    threshold: f64,
    mut translate: impl FnMut(&MethodDescriptor<BinaryName>) -> Result<MethodDescriptor<BinaryName>, E>,
) -> Result<HashMap<MemberKey, MethodHeader>, E> {
    let translated = submission
        .iter()
        .map(|method| Ok((method, translate(&method.descriptor)?)))
        .collect::<Result<Vec<_>, E>>()?;

    let compatible = |sub: &MethodHeader, sol: &MethodHeader| {
        sub.is_static() == sol.is_static() && sub.is_constructor() == sol.is_constructor()
    };

    let mut result = HashMap::new();
    let leftover_rows: Vec<(&MethodHeader, MethodDescriptor<BinaryName>)>;
    let leftover_columns: Vec<MethodHeader>;
    {
        let mapper =
            SimilarityMapper::new(&translated, solution, threshold, |(sub, desc), sol| {
                if !compatible(*sub, sol) || *desc != sol.descriptor {
                    0.0
                } else {
                    name_similarity(sub.name.as_str(), sol.name.as_str())
                }
            });
        for ((sub, _), sol) in mapper.matches() {
            result.insert(sub.key(), sol.clone());
        }
        leftover_rows = mapper.unmatched_rows().cloned().collect();
        leftover_columns = mapper.unmatched_columns().cloned().collect();
    }

    let fallback = SimilarityMapper::new(
        &leftover_rows,
        &leftover_columns,
        threshold,
        |(sub, desc), sol| {
            if !compatible(*sub, sol) || desc.parameters.len() != sol.descriptor.parameters.len() {
                0.0
            } else {
                name_similarity(sub.name.as_str(), sol.name.as_str())
            }
        },
    );
    for ((sub, _), sol) in fallback.matches() {
        log::debug!(
            "Loosely matched '{}' with '{}'",
            sub.describe(),
            sol.describe()
        );
        result.insert(sub.key(), sol.clone());
    }

    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags, UnqualifiedName};
    use std::convert::Infallible;

    fn binary(name: &str) -> BinaryName {
        BinaryName::from_string(name.to_owned()).unwrap()
    }

    fn unqualified(name: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(name.to_owned()).unwrap()
    }

    fn class(name: &str, interface: bool) -> ClassHeader {
        let mut access = ClassAccessFlags::PUBLIC;
        if interface {
            access |= ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        }
        ClassHeader {
            access,
            name: binary(name),
            signature: None,
            super_name: Some(BinaryName::OBJECT),
            interfaces: vec![],
        }
    }

    fn method(
        owner: &str,
        name: &str,
        parameters: Vec<FieldType<BinaryName>>,
        return_type: Option<FieldType<BinaryName>>,
    ) -> MethodHeader {
        MethodHeader {
            owner: binary(owner),
            access: MethodAccessFlags::PUBLIC,
            name: unqualified(name),
            descriptor: MethodDescriptor {
                parameters,
                return_type,
            },
            signature: None,
            exceptions: vec![],
        }
    }

    #[test]
    fn classes_respect_interfaceness() {
        let submission = vec![class("sub/Calculater", false), class("sub/Shape", false)];
        let solution = vec![class("h00/Calculator", false), class("h00/Shape", true)];
        let mapping = map_classes(&submission, &solution, 0.5);

        assert_eq!(
            mapping.get(&binary("sub/Calculater")),
            Some(&binary("h00/Calculator"))
        );
        assert_eq!(mapping.get(&binary("sub/Shape")), None);
    }

    #[test]
    fn fields_need_equal_descriptors() {
        let field = |name: &str, descriptor, access| FieldHeader {
            owner: binary("h00/Calculator"),
            access,
            name: unqualified(name),
            descriptor,
            signature: None,
        };
        let submission = vec![
            field("memory", FieldType::int(), FieldAccessFlags::PRIVATE),
            field("count", FieldType::long(), FieldAccessFlags::PRIVATE),
            field("total", FieldType::int(), FieldAccessFlags::STATIC),
        ];
        let solution = vec![
            field("memory", FieldType::long(), FieldAccessFlags::PRIVATE),
            field("counter", FieldType::long(), FieldAccessFlags::PRIVATE),
            field("total", FieldType::int(), FieldAccessFlags::PRIVATE),
        ];
        let mapping = map_fields(&submission, &solution, 0.5, |d| {
            Ok::<_, Infallible>(d.clone())
        })
        .unwrap();

        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping[&submission[1].key()].name,
            unqualified("counter")
        );
    }

    #[test]
    fn methods_fall_back_on_parameter_count() {
        let submission = vec![
            method("h00/Calc", "add", vec![FieldType::int(), FieldType::int()], Some(FieldType::int())),
            method("h00/Calc", "substract", vec![FieldType::long()], Some(FieldType::long())),
            method("h00/Calc", "<init>", vec![], None),
        ];
        let solution = vec![
            method("h00/Calc", "add", vec![FieldType::int(), FieldType::int()], Some(FieldType::int())),
            method("h00/Calc", "subtract", vec![FieldType::int()], Some(FieldType::int())),
            method("h00/Calc", "<init>", vec![FieldType::int()], None),
        ];
        let mapping = map_methods(&submission, &solution, 0.5, |d| {
            Ok::<_, Infallible>(d.clone())
        })
        .unwrap();

        assert_eq!(mapping[&submission[0].key()].descriptor, solution[0].descriptor);
        assert_eq!(mapping[&submission[1].key()].name, unqualified("subtract"));
        assert!(!mapping.contains_key(&submission[2].key()));
    }

    #[test]
    fn translation_errors_propagate() {
        let submission = vec![method("h00/Calc", "add", vec![], None)];
        let result = map_methods(&submission, &[], 0.5, |_| Err("missing"));
        assert_eq!(result.unwrap_err(), "missing");
    }
}
