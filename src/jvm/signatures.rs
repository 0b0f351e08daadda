//! Generic signatures, as stored in `Signature` attributes
//!
//! The grammar is described [here][0]. We never need to reason about type variables or bounds,
//! only to rewrite the classes that a signature mentions, so rather than building up a full AST
//! we walk the grammar and copy it through, passing every class name through a mapping.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.9.1

use super::{BinaryName, Name};
use std::io::{Error, ErrorKind};
use std::iter::Peekable;
use std::str::Chars;

/// Rewrite every class name mentioned in a class, method, or field signature
pub fn map_signature_classes<E: From<Error>>(
    signature: &str,
    map_class: impl FnMut(&BinaryName) -> Result<BinaryName, E>,
) -> Result<String, E> {
    let mut remapper = SignatureRemapper {
        source: signature.chars().peekable(),
        output: String::with_capacity(signature.len()),
        map_class,
    };

    if remapper.peek() == Some('<') {
        remapper.type_parameters()?;
    }
    if remapper.peek() == Some('(') {
        remapper.method_tail()?;
    } else {
        // Superclass and superinterfaces, or a lone field type
        while remapper.peek().is_some() {
            remapper.reference_type()?;
        }
    }
    Ok(remapper.output)
}

struct SignatureRemapper<'a, F> {
    source: Peekable<Chars<'a>>,
    output: String,
    map_class: F,
}

impl<'a, E, F> SignatureRemapper<'a, F>
where
    E: From<Error>,
    F: FnMut(&BinaryName) -> Result<BinaryName, E>,
{
    fn peek(&mut self) -> Option<char> {
        self.source.peek().copied()
    }

    fn expect(&mut self, expected: char) -> Result<(), E> {
        match self.source.next() {
            Some(c) if c == expected => {
                self.output.push(c);
                Ok(())
            }
            Some(c) => Err(invalid(format!("Expected '{}' but found '{}'", expected, c))),
            None => Err(invalid(format!("Expected '{}' but found end", expected))),
        }
    }

    /// Copy characters through until one of the terminators is next
    fn identifier(&mut self, terminators: &[char]) -> Result<String, E> {
        let mut identifier = String::new();
        loop {
            match self.peek() {
                None => return Err(invalid(format!("Unterminated identifier '{}'", identifier))),
                Some(c) if terminators.contains(&c) => return Ok(identifier),
                Some(c) => {
                    identifier.push(c);
                    self.source.next();
                }
            }
        }
    }

    fn type_parameters(&mut self) -> Result<(), E> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            let name = self.identifier(&[':'])?;
            self.output.push_str(&name);

            // Class bound (may be empty) followed by interface bounds
            self.expect(':')?;
            if matches!(self.peek(), Some('L' | 'T' | '[')) {
                self.reference_type()?;
            }
            while self.peek() == Some(':') {
                self.expect(':')?;
                self.reference_type()?;
            }
        }
        self.expect('>')
    }

    fn method_tail(&mut self) -> Result<(), E> {
        self.expect('(')?;
        while self.peek() != Some(')') {
            self.java_type()?;
        }
        self.expect(')')?;
        if self.peek() == Some('V') {
            self.expect('V')?;
        } else {
            self.java_type()?;
        }
        while self.peek() == Some('^') {
            self.expect('^')?;
            self.reference_type()?;
        }
        Ok(())
    }

    fn java_type(&mut self) -> Result<(), E> {
        match self.peek() {
            Some(c @ ('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z')) => self.expect(c),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<(), E> {
        match self.peek() {
            Some('L') => self.class_type(),
            Some('T') => {
                self.expect('T')?;
                let variable = self.identifier(&[';'])?;
                self.output.push_str(&variable);
                self.expect(';')
            }
            Some('[') => {
                self.expect('[')?;
                self.java_type()
            }
            Some(c) => Err(invalid(format!("Invalid start to reference type '{}'", c))),
            None => Err(invalid(String::from("Expected reference type"))),
        }
    }

    fn class_type(&mut self) -> Result<(), E> {
        self.expect('L')?;
        let class_name = self.identifier(&['<', '.', ';'])?;
        let mut original = BinaryName::from_string(class_name).map_err(invalid)?;
        let mut mapped = (self.map_class)(&original)?;
        self.output.push_str(mapped.as_str());

        loop {
            match self.peek() {
                Some('<') => self.type_arguments()?,
                Some('.') => {
                    self.expect('.')?;
                    let inner = self.identifier(&['<', '.', ';'])?;

                    // `Outer<..>.Inner` names the class `Outer$Inner`
                    let nested = format!("{}${}", original.as_str(), inner);
                    let nested = BinaryName::from_string(nested).map_err(invalid)?;
                    let mapped_nested = (self.map_class)(&nested)?;
                    self.output
                        .push_str(simple_inner_name(&mapped, &mapped_nested, &inner));
                    original = nested;
                    mapped = mapped_nested;
                }
                _ => break,
            }
        }
        self.expect(';')
    }

    fn type_arguments(&mut self) -> Result<(), E> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            match self.peek() {
                Some('*') => self.expect('*')?,
                Some(c @ ('+' | '-')) => {
                    self.expect(c)?;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect('>')
    }
}

fn invalid<E: From<Error>>(msg: String) -> E {
    E::from(Error::new(ErrorKind::InvalidInput, msg))
}

/// Name of `inner` relative to its enclosing class `outer`
///
/// Falls back to the part after the last `$` when `inner` was moved out from under `outer`, and
/// to `unmapped` if that is empty.
pub fn simple_inner_name<'a>(
    outer: &BinaryName,
    inner: &'a BinaryName,
    unmapped: &'a str,
) -> &'a str {
    let inner = inner.as_str();
    let simple = inner
        .strip_prefix(outer.as_str())
        .and_then(|rest| rest.strip_prefix('$'))
        .or_else(|| inner.rsplit_once('$').map(|(_, simple)| simple))
        .unwrap_or(unmapped);
    if simple.is_empty() {
        unmapped
    } else {
        simple
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rename(signature: &str) -> String {
        map_signature_classes(signature, |class: &BinaryName| -> Result<BinaryName, Error> {
            if class.as_str() == "sub/Node" {
                Ok(BinaryName::from_string(String::from("ref/Node")).unwrap())
            } else {
                Ok(class.clone())
            }
        })
        .unwrap()
    }

    #[test]
    fn field_signature() {
        assert_eq!(
            rename("Ljava/util/List<Lsub/Node;>;"),
            "Ljava/util/List<Lref/Node;>;"
        );
        assert_eq!(
            rename("Ljava/util/Map<+Lsub/Node;[Lsub/Node;>;"),
            "Ljava/util/Map<+Lref/Node;[Lref/Node;>;"
        );
    }

    #[test]
    fn class_signature_with_bounds() {
        assert_eq!(
            rename("<T:Lsub/Node;U::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;"),
            "<T:Lref/Node;U::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;"
        );
    }

    #[test]
    fn method_signature_with_inner_classes() {
        assert_eq!(
            rename("<L:Ljava/lang/Object;>(TL;Lsub/Node<*>.Entry<TL;>;)Lsub/Node;^TL;"),
            "<L:Ljava/lang/Object;>(TL;Lref/Node<*>.Entry<TL;>;)Lref/Node;^TL;"
        );
    }

    #[test]
    fn inner_class_segments_are_renamed() {
        let renamed = map_signature_classes(
            "Lsub/Lst<TT;>.Nod;",
            |class: &BinaryName| -> Result<BinaryName, Error> {
                let renamed = match class.as_str() {
                    "sub/Lst" => "h00/List",
                    "sub/Lst$Nod" => "h00/List$Node",
                    other => other,
                };
                Ok(BinaryName::from_string(String::from(renamed)).unwrap())
            },
        )
        .unwrap();
        assert_eq!(renamed, "Lh00/List<TT;>.Node;");
    }

    #[test]
    fn simple_inner_names() {
        let name = |s: &str| BinaryName::from_string(String::from(s)).unwrap();
        assert_eq!(
            simple_inner_name(&name("h00/List"), &name("h00/List$Node"), "Nod"),
            "Node"
        );
        assert_eq!(
            simple_inner_name(&name("h00/List"), &name("h00/Node$Entry"), "Ent"),
            "Entry"
        );
        assert_eq!(
            simple_inner_name(&name("h00/List"), &name("h00/Tree"), "Tree"),
            "Tree"
        );
    }

    #[test]
    fn malformed_signature() {
        let result = map_signature_classes("Ljava/util/List<", |class: &BinaryName| {
            Ok::<BinaryName, Error>(class.clone())
        });
        assert!(result.is_err());
    }
}
