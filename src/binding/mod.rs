//! Arena of resolved bindings
//!
//! Everything a resolved tree refers to (classes, fields, methods, locals) lives in a
//! `BindingTable` and is addressed by small `Copy` handles. Trees never own bindings, so there are
//! no reference cycles between nodes and the symbols they mention.
//!
//! The table is append-only and backed by `FrozenVec`s: new entries can be added through a shared
//! reference. Code generation relies on this to request synthetic accessors while the tree and
//! the table are both borrowed.

use crate::jvm::{
    ClassAccessFlags, FieldAccessFlags, FieldType, MemberAccess, MethodAccessFlags,
    MethodDescriptor, RenderDescriptor,
};
use elsa::FrozenVec;
use std::fmt;

mod java_library;

pub use java_library::*;

/// Handle on a class or interface
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ClassId(u32);

/// Handle on a field
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct FieldId(u32);

/// Handle on a method or constructor
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct MethodId(u32);

/// Handle on a local variable (including method arguments)
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct LocalId(u32);

/// Resolved type of a value
pub type TypeRef = FieldType<ClassId>;

/// What a name was resolved to
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Binding {
    Local(LocalId),
    Field(FieldId),
    Method(MethodId),
    Type(ClassId),

    /// Resolution failed (and already reported why)
    Problem(ProblemReason),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ProblemReason {
    NotFound(String),
    NotVisible(String),
    Ambiguous(String),
}

impl fmt::Display for ProblemReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemReason::NotFound(name) => write!(f, "{} cannot be resolved", name),
            ProblemReason::NotVisible(name) => write!(f, "{} is not visible", name),
            ProblemReason::Ambiguous(name) => write!(f, "{} is ambiguous", name),
        }
    }
}

#[derive(Debug)]
pub struct ClassData {
    /// Binary name (eg. `java/lang/String` or `pkg/Outer$Inner`)
    pub name: String,

    pub superclass: Option<ClassId>,

    /// Lexically enclosing class, for nested classes
    pub enclosing: Option<ClassId>,

    pub access_flags: ClassAccessFlags,
}

impl ClassData {
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}

#[derive(Debug)]
pub struct FieldData {
    pub class: ClassId,
    pub name: String,
    pub descriptor: TypeRef,
    pub access_flags: FieldAccessFlags,
}

#[derive(Debug)]
pub struct MethodData {
    pub class: ClassId,

    /// `<init>` for constructors, `<clinit>` for static initializers
    pub name: String,

    pub descriptor: MethodDescriptor<ClassId>,
    pub access_flags: MethodAccessFlags,
}

impl MethodData {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.is_static()
    }
}

#[derive(Debug)]
pub struct LocalData {
    pub name: String,
    pub descriptor: TypeRef,
    pub is_final: bool,

    /// Index of the local in its method, in declaration order (arguments first)
    ///
    /// Flow analysis uses this as the bit tracking whether the local is assigned.
    pub flow_id: usize,

    pub is_argument: bool,
}

/// What a synthetic accessor does with its target
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AccessorKind {
    FieldRead,
    FieldWrite,
    MethodCall,
    ConstructorCall,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Member {
    Field(FieldId),
    Method(MethodId),
}

/// A package-visible static method standing in for access to a private member
#[derive(Debug)]
pub struct SyntheticAccessor {
    pub kind: AccessorKind,
    pub target: Member,

    /// The `access$N` method itself (declared on the same class as the target)
    pub method: MethodId,
}

pub struct BindingTable {
    classes: FrozenVec<Box<ClassData>>,
    fields: FrozenVec<Box<FieldData>>,
    methods: FrozenVec<Box<MethodData>>,
    locals: FrozenVec<Box<LocalData>>,
    accessors: FrozenVec<Box<SyntheticAccessor>>,

    /// Library classes and members used by generated code
    pub java: JavaLibrary,
}

impl BindingTable {
    /// New table, already containing the library classes codegen depends on
    pub fn new() -> BindingTable {
        let mut table = BindingTable {
            classes: FrozenVec::new(),
            fields: FrozenVec::new(),
            methods: FrozenVec::new(),
            locals: FrozenVec::new(),
            accessors: FrozenVec::new(),
            java: JavaLibrary::default(),
        };
        table.java = JavaLibrary::add_to_table(&table);
        table
    }

    pub fn add_class(&self, class: ClassData) -> ClassId {
        self.classes.push(Box::new(class));
        ClassId(self.classes.len() as u32 - 1)
    }

    pub fn add_field(&self, field: FieldData) -> FieldId {
        self.fields.push(Box::new(field));
        FieldId(self.fields.len() as u32 - 1)
    }

    pub fn add_method(&self, method: MethodData) -> MethodId {
        self.methods.push(Box::new(method));
        MethodId(self.methods.len() as u32 - 1)
    }

    pub fn add_local(&self, local: LocalData) -> LocalId {
        self.locals.push(Box::new(local));
        LocalId(self.locals.len() as u32 - 1)
    }

    pub fn class(&self, id: ClassId) -> &ClassData {
        &self.classes[id.0 as usize]
    }

    pub fn field(&self, id: FieldId) -> &FieldData {
        &self.fields[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &MethodData {
        &self.methods[id.0 as usize]
    }

    pub fn local(&self, id: LocalId) -> &LocalData {
        &self.locals[id.0 as usize]
    }

    /// Top-level class containing `class` (possibly itself)
    pub fn outermost_class(&self, mut class: ClassId) -> ClassId {
        while let Some(enclosing) = self.class(class).enclosing {
            class = enclosing;
        }
        class
    }

    /// Is `sub` the same class as `sup`, or a subclass of it?
    pub fn is_subclass(&self, mut sub: ClassId, sup: ClassId) -> bool {
        loop {
            if sub == sup {
                return true;
            }
            match self.class(sub).superclass {
                Some(next) => sub = next,
                None => return false,
            }
        }
    }

    /// Descriptor string of a type, eg. `[Ljava/lang/String;`
    pub fn type_descriptor(&self, ty: &TypeRef) -> String {
        ty.map(|class| self.class(*class).name.as_str()).render()
    }

    /// Descriptor string of a method, eg. `(IJ)V`
    pub fn method_descriptor(&self, method: MethodId) -> String {
        self.render_method_descriptor(&self.method(method).descriptor)
    }

    pub fn render_method_descriptor(&self, descriptor: &MethodDescriptor<ClassId>) -> String {
        MethodDescriptor {
            parameters: descriptor
                .parameters
                .iter()
                .map(|param| param.map(|class| self.class(*class).name.as_str()))
                .collect(),
            return_type: descriptor
                .return_type
                .as_ref()
                .map(|ret| ret.map(|class| self.class(*class).name.as_str())),
        }
        .render()
    }

    /// Name to use in a constant pool `Class` entry for a reference type
    ///
    /// Arrays are named by their descriptor, classes by their binary name.
    pub fn class_constant_name(&self, ty: &TypeRef) -> String {
        match ty {
            FieldType::Ref(crate::jvm::RefType::Object(class)) => self.class(*class).name.clone(),
            other => self.type_descriptor(other),
        }
    }

    /// Would accessing `member` from code in `from` require going through an accessor?
    ///
    /// That is the case for private members of another class nested in the same top-level class:
    /// the language allows the access but the JVM does not.
    pub fn requires_accessor(&self, member: Member, from: ClassId) -> bool {
        let (declaring, private) = match member {
            Member::Field(field) => {
                let data = self.field(field);
                (data.class, data.access_flags.is_private())
            }
            Member::Method(method) => {
                let data = self.method(method);
                (data.class, data.access_flags.is_private())
            }
        };
        private
            && declaring != from
            && self.outermost_class(declaring) == self.outermost_class(from)
    }

    /// Find or create the accessor for a member
    ///
    /// The accessor is a static method on the member's declaring class. Its parameters are the
    /// receiver (for instance members), then the arguments (method calls), or the new value
    /// (field writes). Field writes return the stored value, constructor calls return the new
    /// object.
    pub fn synthetic_accessor(&self, target: Member, kind: AccessorKind) -> MethodId {
        for idx in 0..self.accessors.len() {
            let accessor = &self.accessors[idx];
            if accessor.target == target && accessor.kind == kind {
                return accessor.method;
            }
        }

        let (class, descriptor) = match target {
            Member::Field(field) => {
                let data = self.field(field);
                let mut parameters = vec![];
                if !data.access_flags.is_static() {
                    parameters.push(FieldType::object(data.class));
                }
                if kind == AccessorKind::FieldWrite {
                    parameters.push(data.descriptor);
                }
                let descriptor = MethodDescriptor {
                    parameters,
                    return_type: Some(data.descriptor),
                };
                (data.class, descriptor)
            }
            Member::Method(method) => {
                let data = self.method(method);
                let mut parameters = vec![];
                if !data.is_static() && kind != AccessorKind::ConstructorCall {
                    parameters.push(FieldType::object(data.class));
                }
                parameters.extend(data.descriptor.parameters.iter().copied());
                let return_type = if kind == AccessorKind::ConstructorCall {
                    Some(FieldType::object(data.class))
                } else {
                    data.descriptor.return_type
                };
                (
                    data.class,
                    MethodDescriptor {
                        parameters,
                        return_type,
                    },
                )
            }
        };

        let existing = (0..self.accessors.len())
            .filter(|idx| self.method(self.accessors[*idx].method).class == class)
            .count();
        let method = self.add_method(MethodData {
            class,
            name: format!("access${}", existing),
            descriptor,
            access_flags: MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
        });
        log::debug!(
            "synthesizing {:?} accessor {} on {}",
            kind,
            self.method(method).name,
            self.class(class).name
        );
        self.accessors.push(Box::new(SyntheticAccessor {
            kind,
            target,
            method,
        }));
        method
    }

    /// Every accessor requested so far
    pub fn accessors(&self) -> Vec<&SyntheticAccessor> {
        (0..self.accessors.len())
            .map(|idx| &self.accessors[idx])
            .collect()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        BindingTable::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn nested(table: &BindingTable) -> (ClassId, ClassId) {
        let outer = table.add_class(ClassData {
            name: "pkg/Outer".to_string(),
            superclass: Some(table.java.object),
            enclosing: None,
            access_flags: ClassAccessFlags::SUPER,
        });
        let inner = table.add_class(ClassData {
            name: "pkg/Outer$Inner".to_string(),
            superclass: Some(table.java.object),
            enclosing: Some(outer),
            access_flags: ClassAccessFlags::SUPER,
        });
        (outer, inner)
    }

    #[test]
    fn descriptors_use_binary_names() {
        let table = BindingTable::new();
        let ty = FieldType::array(FieldType::object(table.java.string));
        assert_eq!(table.type_descriptor(&ty), "[Ljava/lang/String;");
        assert_eq!(table.class_constant_name(&ty), "[Ljava/lang/String;");
        assert_eq!(
            table.method_descriptor(table.java.string_builder_append_int),
            "(I)Ljava/lang/StringBuilder;"
        );
    }

    #[test]
    fn private_members_of_nestmates_need_accessors() {
        let table = BindingTable::new();
        let (outer, inner) = nested(&table);
        let secret = table.add_field(FieldData {
            class: outer,
            name: "secret".to_string(),
            descriptor: FieldType::int(),
            access_flags: FieldAccessFlags::PRIVATE,
        });
        assert!(table.requires_accessor(Member::Field(secret), inner));
        assert!(!table.requires_accessor(Member::Field(secret), outer));
        assert!(!table.requires_accessor(Member::Field(secret), table.java.string));
    }

    #[test]
    fn accessors_are_shared() {
        let table = BindingTable::new();
        let (outer, _) = nested(&table);
        let secret = table.add_field(FieldData {
            class: outer,
            name: "secret".to_string(),
            descriptor: FieldType::long(),
            access_flags: FieldAccessFlags::PRIVATE,
        });
        let read = table.synthetic_accessor(Member::Field(secret), AccessorKind::FieldRead);
        let write = table.synthetic_accessor(Member::Field(secret), AccessorKind::FieldWrite);
        assert_eq!(
            read,
            table.synthetic_accessor(Member::Field(secret), AccessorKind::FieldRead)
        );
        assert_eq!(table.method(read).name, "access$0");
        assert_eq!(table.method(write).name, "access$1");
        assert_eq!(table.method_descriptor(read), "(Lpkg/Outer;)J");
        assert_eq!(table.method_descriptor(write), "(Lpkg/Outer;J)J");
        assert_eq!(table.accessors().len(), 2);
    }
}
