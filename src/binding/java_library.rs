use super::*;

/// Library classes and members that generated code refers to on its own (eg. for string
/// concatenation), independently of what the source mentions
#[derive(Default, Debug)]
pub struct JavaLibrary {
    pub object: ClassId,
    pub string: ClassId,
    pub string_builder: ClassId,
    pub throwable: ClassId,
    pub error: ClassId,

    /// `Object.<init>()`
    pub object_init: MethodId,

    /// `String.valueOf(Object)`
    pub string_value_of: MethodId,

    /// `StringBuilder.<init>()`
    pub string_builder_init: MethodId,

    /// `StringBuilder.<init>(String)`
    pub string_builder_init_string: MethodId,

    pub string_builder_append_string: MethodId,
    pub string_builder_append_object: MethodId,
    pub string_builder_append_int: MethodId,
    pub string_builder_append_char: MethodId,
    pub string_builder_append_boolean: MethodId,
    pub string_builder_append_long: MethodId,
    pub string_builder_append_float: MethodId,
    pub string_builder_append_double: MethodId,

    /// `StringBuilder.toString()`
    pub string_builder_to_string: MethodId,
}

impl JavaLibrary {
    pub fn add_to_table(table: &BindingTable) -> JavaLibrary {
        let class = |name: &str, superclass: Option<ClassId>, flags: ClassAccessFlags| {
            table.add_class(ClassData {
                name: name.to_string(),
                superclass,
                enclosing: None,
                access_flags: flags | ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            })
        };
        let object = class("java/lang/Object", None, ClassAccessFlags::empty());
        let string = class("java/lang/String", Some(object), ClassAccessFlags::FINAL);
        let string_builder = class(
            "java/lang/StringBuilder",
            Some(object),
            ClassAccessFlags::FINAL,
        );
        let throwable = class("java/lang/Throwable", Some(object), ClassAccessFlags::empty());
        let error = class("java/lang/Error", Some(throwable), ClassAccessFlags::empty());

        let method = |class: ClassId,
                      name: &str,
                      parameters: Vec<TypeRef>,
                      return_type: Option<TypeRef>,
                      is_static: bool| {
            let mut access_flags = MethodAccessFlags::PUBLIC;
            if is_static {
                access_flags |= MethodAccessFlags::STATIC;
            }
            table.add_method(MethodData {
                class,
                name: name.to_string(),
                descriptor: MethodDescriptor {
                    parameters,
                    return_type,
                },
                access_flags,
            })
        };
        let string_type = FieldType::object(string);
        let builder_type = Some(FieldType::object(string_builder));
        let append = |param: TypeRef| {
            method(string_builder, "append", vec![param], builder_type, false)
        };

        JavaLibrary {
            object,
            string,
            string_builder,
            throwable,
            error,
            object_init: method(object, "<init>", vec![], None, false),
            string_value_of: method(
                string,
                "valueOf",
                vec![FieldType::object(object)],
                Some(string_type),
                true,
            ),
            string_builder_init: method(string_builder, "<init>", vec![], None, false),
            string_builder_init_string: method(
                string_builder,
                "<init>",
                vec![string_type],
                None,
                false,
            ),
            string_builder_append_string: append(string_type),
            string_builder_append_object: append(FieldType::object(object)),
            string_builder_append_int: append(FieldType::int()),
            string_builder_append_char: append(FieldType::Base(crate::jvm::BaseType::Char)),
            string_builder_append_boolean: append(FieldType::boolean()),
            string_builder_append_long: append(FieldType::long()),
            string_builder_append_float: append(FieldType::float()),
            string_builder_append_double: append(FieldType::double()),
            string_builder_to_string: method(
                string_builder,
                "toString",
                vec![],
                Some(string_type),
                false,
            ),
        }
    }

    /// The `StringBuilder.append` overload used for a value of the given type
    pub fn append_for(&self, ty: &TypeRef) -> MethodId {
        use crate::jvm::{BaseType, RefType};
        match ty {
            FieldType::Base(BaseType::Char) => self.string_builder_append_char,
            FieldType::Base(BaseType::Boolean) => self.string_builder_append_boolean,
            FieldType::Base(BaseType::Long) => self.string_builder_append_long,
            FieldType::Base(BaseType::Float) => self.string_builder_append_float,
            FieldType::Base(BaseType::Double) => self.string_builder_append_double,
            FieldType::Base(_) => self.string_builder_append_int,
            FieldType::Ref(RefType::Object(class)) if *class == self.string => {
                self.string_builder_append_string
            }
            FieldType::Ref(_) => self.string_builder_append_object,
        }
    }
}
