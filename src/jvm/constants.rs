use super::Error;
use crate::util::{Offset, OffsetResult, OffsetVec, Width};
use std::borrow::{Borrow, Cow};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Largest encoded length of a single `Utf8` entry
pub const MAX_UTF8_LENGTH: usize = u16::MAX as usize;

// Note: elements can be easily added to the pool, but not so easily removed
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    /// First offset which is not allowed to hold a constant
    limit: usize,

    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    fieldrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex), ConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), ConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, ConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<[u8; 4], ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<[u8; 8], ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool::with_limit(u16::MAX.into())
    }

    /// Make a fresh pool which refuses to grow past `limit` entries
    ///
    /// Real class files are capped at 65535 entries, smaller limits make the overflow path
    /// reachable in tests.
    pub fn with_limit(limit: usize) -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            limit,
            classes: HashMap::new(),
            fieldrefs: HashMap::new(),
            methodrefs: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            utf8s: HashMap::new(),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: indexing starts at 1 and some constants take two spaces.
    fn push_constant(
        constants: &mut OffsetVec<Constant>,
        limit: usize,
        constant: Constant,
    ) -> Result<ConstantIndex, Error> {
        let Offset(offset) = constants.offset_len();

        if offset + constant.width() <= limit {
            let _ = constants.push(constant);
            Ok(ConstantIndex(offset as u16))
        } else {
            Err(Error::ConstantPoolOverflow { constant, offset })
        }
    }

    /// Number of slots used so far (including the unusable slot `0`)
    pub fn len(&self) -> usize {
        self.constants.offset_len().0
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Get a constant from the pool
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        match self.constants.get_offset(Offset(index.0 as usize)) {
            OffsetResult::Ok(_, constant) => Some(constant),
            _ => None,
        }
    }

    /// Get or insert a class constant from the constant pool
    pub fn get_class(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        match self.classes.entry(name) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::Class(name);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(ClassConstantIndex(idx)))
            }
        }
    }

    /// Get or insert an integer constant from the constant pool
    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        match self.integers.entry(integer) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::Integer(integer);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a long constant from the constant pool
    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        match self.longs.entry(long) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::Long(long);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a float constant from the constant pool
    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        match self.floats.entry(float.to_ne_bytes()) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::Float(float);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a double constant from the constant pool
    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        match self.doubles.entry(double.to_ne_bytes()) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::Double(double);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a utf8 constant from the constant pool
    ///
    /// Strings whose modified UTF-8 encoding is longer than `MAX_UTF8_LENGTH` are rejected: the
    /// caller is responsible for splitting those up.
    pub fn get_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, Error> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            return Ok(*idx);
        }

        let length = modified_utf8_length(&cow);
        if length > MAX_UTF8_LENGTH {
            return Err(Error::Utf8ConstantTooLong { length });
        }
        let owned = cow.into_owned();
        let constant = Constant::Utf8(owned.clone());
        let idx = Utf8ConstantIndex(Self::push_constant(
            &mut self.constants,
            self.limit,
            constant,
        )?);
        self.utf8s.insert(owned, idx);
        Ok(idx)
    }

    /// Get or insert a string constant from the constant pool
    pub fn get_string(&mut self, string: &str) -> Result<ConstantIndex, Error> {
        let utf8 = self.get_utf8(string)?;
        match self.strings.entry(utf8) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::String(utf8);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        match self.name_and_types.entry((name, descriptor)) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::NameAndType { name, descriptor };
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(NameAndTypeConstantIndex(idx)))
            }
        }
    }

    /// Get or insert a field reference constant from the constant pool
    pub fn get_field_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        let class = self.get_class(class)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        match self.fieldrefs.entry((class, name_and_type)) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::FieldRef(class, name_and_type);
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    /// Get or insert a method reference constant from the constant pool
    pub fn get_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<ConstantIndex, Error> {
        let class = self.get_class(class)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        match self.methodrefs.entry((class, name_and_type, is_interface)) {
            Entry::Occupied(occupied) => Ok(*occupied.get()),
            Entry::Vacant(vacant) => {
                let constant = Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface,
                };
                let idx = Self::push_constant(&mut self.constants, self.limit, constant)?;
                Ok(*vacant.insert(idx))
            }
        }
    }

    fn lookup_utf8(&self, index: Utf8ConstantIndex) -> Option<&str> {
        match self.get(index.0) {
            Some(Constant::Utf8(string)) => Some(string),
            _ => None,
        }
    }

    /// Descriptor of a field or method reference
    pub fn member_descriptor(&self, index: ConstantIndex) -> Option<&str> {
        let name_and_type = match self.get(index)? {
            Constant::FieldRef(_, name_and_type) => *name_and_type,
            Constant::MethodRef { name_and_type, .. } => *name_and_type,
            _ => return None,
        };
        match self.get(name_and_type.0)? {
            Constant::NameAndType { descriptor, .. } => self.lookup_utf8(*descriptor),
            _ => None,
        }
    }

    /// Name of a field or method reference
    pub fn member_name(&self, index: ConstantIndex) -> Option<&str> {
        let name_and_type = match self.get(index)? {
            Constant::FieldRef(_, name_and_type) => *name_and_type,
            Constant::MethodRef { name_and_type, .. } => *name_and_type,
            _ => return None,
        };
        match self.get(name_and_type.0)? {
            Constant::NameAndType { name, .. } => self.lookup_utf8(*name),
            _ => None,
        }
    }

    /// Binary name of the class declaring a field or method reference
    pub fn member_class(&self, index: ConstantIndex) -> Option<&str> {
        match self.get(index)? {
            Constant::FieldRef(class, _) => self.class_name(class.0),
            Constant::MethodRef { class, .. } => self.class_name(class.0),
            _ => None,
        }
    }

    /// Binary name of a class constant
    pub fn class_name(&self, index: ConstantIndex) -> Option<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.lookup_utf8(*name),
            _ => None,
        }
    }

    /// Contents of a string constant
    pub fn string_value(&self, index: ConstantIndex) -> Option<&str> {
        match self.get(index)? {
            Constant::String(utf8) => self.lookup_utf8(*utf8),
            _ => None,
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

/// Length of a string once encoded in the JVM's modified UTF-8
///
/// The differences from regular UTF-8: `\u{0000}` takes two bytes, and supplementary characters
/// are encoded as surrogate pairs of three bytes each.
pub fn modified_utf8_length(string: &str) -> usize {
    string
        .chars()
        .map(|c| match c as u32 {
            0 => 2,
            0x01..=0x7F => 1,
            0x80..=0x7FF => 2,
            0x800..=0xFFFF => 3,
            _ => 6,
        })
        .sum()
}

/// Constants as in the constant pool
///
/// Note: only the constant kinds emitted by method bodies are included
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant raw string value, stored in modified UTF-8 in the class file
    Utf8(String),
}

/// `long` and `double` constants take up two entries in the pool: the entry after them is valid
/// but unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(ConstantIndex);

impl ClassConstantIndex {
    /// Reinterpret an index read back out of code (which is assumed to point to a class)
    pub(crate) const fn from_raw(index: ConstantIndex) -> ClassConstantIndex {
        ClassConstantIndex(index)
    }
}

impl From<ClassConstantIndex> for ConstantIndex {
    fn from(index: ClassConstantIndex) -> ConstantIndex {
        index.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constants_are_shared() {
        let mut pool = ConstantsPool::new();
        let a = pool.get_string("hello").unwrap();
        let b = pool.get_string("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.string_value(a), Some("hello"));

        let m1 = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        let m2 = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        assert_eq!(m1, m2);
        assert_eq!(pool.member_descriptor(m1), Some("()V"));
        assert_eq!(pool.member_name(m1), Some("<init>"));
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantsPool::new();
        let long = pool.get_long(1 << 40).unwrap();
        let int = pool.get_integer(1 << 20).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(int, ConstantIndex(3));
        assert!(pool.get(ConstantIndex(2)).is_none());
    }

    #[test]
    fn limit_is_enforced() {
        let mut pool = ConstantsPool::with_limit(3);
        pool.get_integer(100_000).unwrap();
        pool.get_integer(100_001).unwrap();
        assert!(matches!(
            pool.get_integer(100_002),
            Err(Error::ConstantPoolOverflow { offset: 3, .. })
        ));
        assert!(matches!(
            pool.get_long(7),
            Err(Error::ConstantPoolOverflow { .. })
        ));
    }

    #[test]
    fn modified_utf8_lengths() {
        assert_eq!(modified_utf8_length("abc"), 3);
        assert_eq!(modified_utf8_length("\u{0}"), 2);
        assert_eq!(modified_utf8_length("é"), 2);
        assert_eq!(modified_utf8_length("€"), 3);
        assert_eq!(modified_utf8_length("😀"), 6);
    }

    #[test]
    fn oversized_utf8_is_rejected() {
        let mut pool = ConstantsPool::new();
        let long_string = "x".repeat(MAX_UTF8_LENGTH + 1);
        assert!(matches!(
            pool.get_string(&long_string),
            Err(Error::Utf8ConstantTooLong { .. })
        ));
    }
}
