use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in their internal form (eg. `java/lang/Object`)
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    /// Concatenate the contents of two unqualified names to produce a third
    pub fn concat(&self, other: &UnqualifiedName) -> UnqualifiedName {
        UnqualifiedName(Cow::Owned(format!("{}{}", self.as_str(), other.as_str())))
    }

    /// Is this one of the two special initialization method names?
    pub fn is_initializer(&self) -> bool {
        *self == Self::INIT || *self == Self::CLINIT
    }

    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // JDK names
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const CONCAT: Self = Self::name("concat");
    pub const CURRENTTHREAD: Self = Self::name("currentThread");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");
    pub const EQUALS: Self = Self::name("equals");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const GETSTACKTRACE: Self = Self::name("getStackTrace");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const VALUEOF: Self = Self::name("valueOf");

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // Execution handler protocol
    pub const ADDINVOCATION: Self = Self::name("addInvocation");
    pub const ADDPARAMETER: Self = Self::name("addParameter");
    pub const ARGS: Self = Self::name("args");
    pub const DESCRIPTOR: Self = Self::name("descriptor");
    pub const EXECUTE: Self = Self::name("execute");
    pub const GETCONSTRUCTORINVOCATION: Self = Self::name("getConstructorInvocation");
    pub const GETINSTANCE: Self = Self::name("getInstance");
    pub const GETSUBSTITUTION: Self = Self::name("getSubstitution");
    pub const LOGINVOCATION: Self = Self::name("logInvocation");
    pub const OWNER: Self = Self::name("owner");
    pub const RECORDSTATICFIELDVALUE: Self = Self::name("recordStaticFieldValue");
    pub const SETINSTANCE: Self = Self::name("setInstance");
    pub const USEREFERENCEIMPL: Self = Self::name("useReferenceImpl");
    pub const USESUBSTITUTION: Self = Self::name("useSubstitution");
}

impl BinaryName {
    /// Join segments from the other name onto the end of this binary name
    pub fn join(&self, other: impl Name) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}/{}", self.as_str(), other.as_str())))
    }

    /// Package part of the name (empty for the default package)
    pub fn package(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Name without the package prefix
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => self.0.as_ref(),
        }
    }

    /// Human readable form, with `.` separating packages
    pub fn dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Name known to be valid at compile time
    pub(crate) const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const METHODHANDLE: Self = Self::name("java/lang/invoke/MethodHandle");
    pub const METHODTYPE: Self = Self::name("java/lang/invoke/MethodType");
    pub const NOSUCHMETHODERROR: Self = Self::name("java/lang/NoSuchMethodError");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STACKTRACEELEMENT: Self = Self::name("java/lang/StackTraceElement");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THREAD: Self = Self::name("java/lang/Thread");
    pub const UNSUPPORTEDOPERATIONEXCEPTION: Self =
        Self::name("java/lang/UnsupportedOperationException");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validity() {
        assert!(BinaryName::check_valid("a/b/C$1").is_ok());
        assert!(BinaryName::check_valid("a//C").is_err());
        assert!(BinaryName::check_valid("a/b.C").is_err());
        assert!(UnqualifiedName::check_valid("lambda$run$0").is_ok());
        assert!(UnqualifiedName::check_valid("a/b").is_err());
    }

    #[test]
    fn package_and_simple_name() {
        let name = BinaryName::from_string(String::from("h00/sub/Calculator")).unwrap();
        assert_eq!(name.package(), "h00/sub");
        assert_eq!(name.simple_name(), "Calculator");
        assert_eq!(name.dotted(), "h00.sub.Calculator");

        let default_package = BinaryName::from_string(String::from("Main")).unwrap();
        assert_eq!(default_package.package(), "");
        assert_eq!(default_package.simple_name(), "Main");
    }
}
