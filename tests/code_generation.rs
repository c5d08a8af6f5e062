mod harness;

use harness::*;
use jcodegen::ast::builder::*;
use jcodegen::ast::{BinaryOperator, CompilationUnit, Expression, IncrementKind, Receiver};
use jcodegen::binding::{BindingTable, ClassId, LocalId, MethodId, TypeRef};
use jcodegen::diagnostics::ProblemKind;
use jcodegen::jvm::disassembler::DecodedInstruction;
use jcodegen::jvm::{
    BranchInstruction, FieldAccessFlags, FieldType, Instruction, MethodAccessFlags,
};

fn unit(class: ClassId, methods: Vec<jcodegen::ast::MethodDeclaration>) -> CompilationUnit {
    CompilationUnit {
        types: vec![type_declaration(class, vec![], methods, vec![])],
    }
}

fn static_method(
    tb: &TreeBuilder<'_>,
    class: ClassId,
    name: &str,
    parameters: Vec<TypeRef>,
    return_type: Option<TypeRef>,
) -> MethodId {
    tb.start_method();
    tb.method(class, name, parameters, return_type, MethodAccessFlags::STATIC)
}

/// A two-argument `int` predicate, checked against Rust in each of the ways a condition gets used
fn check_condition(
    build: impl Fn(&TreeBuilder<'_>, LocalId, LocalId) -> Expression,
    expected: impl Fn(i32, i32) -> bool,
) {
    check_condition_reporting(build, expected, &[])
}

/// Like `check_condition`, for conditions the analysis has something to say about
fn check_condition_reporting(
    build: impl Fn(&TreeBuilder<'_>, LocalId, LocalId) -> Expression,
    expected: impl Fn(i32, i32) -> bool,
    expected_kinds: &[ProblemKind],
) {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let ints = vec![FieldType::int(), FieldType::int()];

    // return <cond>;
    let direct = static_method(&tb, class, "direct", ints.clone(), Some(FieldType::boolean()));
    let (a, b) = (tb.argument("a", FieldType::int()), tb.argument("b", FieldType::int()));
    let direct = tb.declaration(direct, vec![a, b], vec![return_(Some(build(&tb, a, b)))]);

    // boolean t = <cond>; return t;
    let stored = static_method(&tb, class, "stored", ints.clone(), Some(FieldType::boolean()));
    let (a, b) = (tb.argument("a", FieldType::int()), tb.argument("b", FieldType::int()));
    let t = tb.local("t", FieldType::boolean());
    let stored = tb.declaration(
        stored,
        vec![a, b],
        vec![declare(t, Some(build(&tb, a, b))), return_(Some(tb.read(t)))],
    );

    // if (<cond>) return 1; else return 0;
    let branched = static_method(&tb, class, "branched", ints, Some(FieldType::int()));
    let (a, b) = (tb.argument("a", FieldType::int()), tb.argument("b", FieldType::int()));
    let branched = tb.declaration(
        branched,
        vec![a, b],
        vec![if_(
            build(&tb, a, b),
            return_(Some(int(1))),
            Some(return_(Some(int(0)))),
        )],
    );

    let methods = [direct.method, stored.method, branched.method];
    let output = compile_default(&bindings, unit(class, vec![direct, stored, branched]));
    assert_eq!(kinds(&output), expected_kinds);
    assert_all_stacks_consistent(&output);

    let mut machine = Machine::new(&output, &bindings);
    for a in -2..=2 {
        for b in -2..=2 {
            let args = [Value::Int(a), Value::Int(b)];
            let want = expected(a, b);
            for method in methods {
                assert_eq!(
                    machine.call(&bindings, method, &args).boolean(),
                    want,
                    "{} with a = {}, b = {}",
                    bindings.method(method).name,
                    a,
                    b
                );
            }
        }
    }
}

fn gt(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Gt, left, right)
}

#[test]
fn and_then_or() {
    // a > 0 && b > 0 || a == b
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::OrOr,
                binary(
                    BinaryOperator::AndAnd,
                    gt(tb.read(a), int(0)),
                    gt(tb.read(b), int(0)),
                ),
                binary(BinaryOperator::Eq, tb.read(a), tb.read(b)),
            )
        },
        |a, b| a > 0 && b > 0 || a == b,
    );
}

#[test]
fn negated_disjunction() {
    // !(a < b || b < 0) && a != 0
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::AndAnd,
                not(binary(
                    BinaryOperator::OrOr,
                    binary(BinaryOperator::Lt, tb.read(a), tb.read(b)),
                    binary(BinaryOperator::Lt, tb.read(b), int(0)),
                )),
                binary(BinaryOperator::Ne, tb.read(a), int(0)),
            )
        },
        |a, b| !(a < b || b < 0) && a != 0,
    );
}

#[test]
fn boolean_xor() {
    // (a > b) ^ (b > 0)
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::Xor,
                gt(tb.read(a), tb.read(b)),
                gt(tb.read(b), int(0)),
            )
        },
        |a, b| (a > b) ^ (b > 0),
    );
}

#[test]
fn eager_boolean_operators() {
    // (a >= 0) & (b <= 0) | a == 1
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::Or,
                binary(
                    BinaryOperator::And,
                    binary(BinaryOperator::Ge, tb.read(a), int(0)),
                    binary(BinaryOperator::Le, tb.read(b), int(0)),
                ),
                binary(BinaryOperator::Eq, tb.read(a), int(1)),
            )
        },
        |a, b| (a >= 0) & (b <= 0) | (a == 1),
    );
}

#[test]
fn boolean_conditional() {
    // a > 0 ? b > 0 : b < 0
    check_condition(
        |tb, a, b| {
            conditional(
                gt(tb.read(a), int(0)),
                gt(tb.read(b), int(0)),
                binary(BinaryOperator::Lt, tb.read(b), int(0)),
            )
        },
        |a, b| if a > 0 { b > 0 } else { b < 0 },
    );
}

#[test]
fn constant_operands() {
    // true && a > b
    check_condition(
        |tb, a, b| binary(BinaryOperator::AndAnd, boolean(true), gt(tb.read(a), tb.read(b))),
        |a, b| a > b,
    );
    // false || a == b
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::OrOr,
                boolean(false),
                binary(BinaryOperator::Eq, tb.read(a), tb.read(b)),
            )
        },
        |a, b| a == b,
    );
    // a > b || true (the `else` of the branching form can only be reached on paper)
    check_condition_reporting(
        |tb, a, b| binary(BinaryOperator::OrOr, gt(tb.read(a), tb.read(b)), boolean(true)),
        |_, _| true,
        &[ProblemKind::DeadCode],
    );
}

#[test]
fn boolean_equality() {
    // (a > 0) == (b > 0)
    check_condition(
        |tb, a, b| {
            binary(
                BinaryOperator::Eq,
                gt(tb.read(a), int(0)),
                gt(tb.read(b), int(0)),
            )
        },
        |a, b| (a > 0) == (b > 0),
    );
}

#[test]
fn integer_arithmetic() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let ints = vec![FieldType::int(), FieldType::int()];
    let f = static_method(&tb, class, "f", ints, Some(FieldType::int()));
    let a = tb.argument("a", FieldType::int());
    let b = tb.argument("b", FieldType::int());

    // return (a % 7) * -b / 2 - (a << 3 >>> 1) + (a & b ^ 12);
    let value = binary(
        BinaryOperator::Add,
        binary(
            BinaryOperator::Sub,
            binary(
                BinaryOperator::Div,
                binary(
                    BinaryOperator::Mul,
                    binary(BinaryOperator::Rem, tb.read(a), int(7)),
                    negate(tb.read(b)),
                ),
                int(2),
            ),
            binary(
                BinaryOperator::UShr,
                binary(BinaryOperator::Shl, tb.read(a), int(3)),
                int(1),
            ),
        ),
        binary(
            BinaryOperator::Xor,
            binary(BinaryOperator::And, tb.read(a), tb.read(b)),
            int(12),
        ),
    );
    let output = compile_default(
        &bindings,
        unit(class, vec![tb.declaration(f, vec![a, b], vec![return_(Some(value))])]),
    );
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let mut machine = Machine::new(&output, &bindings);
    for (a, b) in [(0i32, 0i32), (9, 4), (-23, 5), (100, -7), (-1, -1)] {
        // Java `int` arithmetic wraps
        let shifted = ((a << 3) as u32 >> 1) as i32;
        let expected = ((a % 7).wrapping_mul(-b) / 2)
            .wrapping_sub(shifted)
            .wrapping_add(a & b ^ 12);
        assert_eq!(
            machine.call(&bindings, f, &[Value::Int(a), Value::Int(b)]).int(),
            expected
        );
    }
}

#[test]
fn long_arithmetic_and_comparison() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let params = vec![FieldType::long(), FieldType::int()];

    // long f(long a, int b) { return a * b + (a >> 2); }
    let f = static_method(&tb, class, "f", params.clone(), Some(FieldType::long()));
    let a = tb.argument("a", FieldType::long());
    let b = tb.argument("b", FieldType::int());
    let value = binary(
        BinaryOperator::Add,
        binary(BinaryOperator::Mul, tb.read(a), tb.read(b)),
        binary(BinaryOperator::Shr, tb.read(a), int(2)),
    );
    let f_declaration = tb.declaration(f, vec![a, b], vec![return_(Some(value))]);

    // boolean g(long a, int b) { return a < b; }
    let g = static_method(&tb, class, "g", params, Some(FieldType::boolean()));
    let a = tb.argument("a", FieldType::long());
    let b = tb.argument("b", FieldType::int());
    let g_declaration = tb.declaration(
        g,
        vec![a, b],
        vec![return_(Some(binary(BinaryOperator::Lt, tb.read(a), tb.read(b))))],
    );

    let output = compile_default(&bindings, unit(class, vec![f_declaration, g_declaration]));
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    // Both arguments of `f` take three slots
    assert_eq!(code(&output, &bindings, f).max_locals, 3);
    assert_eq!(count_plain(code(&output, &bindings, f), |insn| matches!(insn, Instruction::I2L)), 1);

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(machine.call(&bindings, f, &[Value::Long(10), Value::Int(3)]).long(), 32);
    assert_eq!(
        machine.call(&bindings, f, &[Value::Long(1 << 40), Value::Int(-2)]).long(),
        -(1i64 << 41) + (1 << 38)
    );
    assert!(machine.call(&bindings, g, &[Value::Long(5), Value::Int(7)]).boolean());
    assert!(!machine.call(&bindings, g, &[Value::Long(8), Value::Int(7)]).boolean());
    assert!(!machine.call(&bindings, g, &[Value::Long(1 << 33), Value::Int(7)]).boolean());
}

#[test]
fn arrays() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let f = static_method(&tb, class, "f", vec![FieldType::int()], Some(FieldType::int()));
    let n = tb.argument("n", FieldType::int());
    let squares = tb.local("squares", FieldType::array(FieldType::int()));
    let i = tb.local("i", FieldType::int());
    let sum = tb.local("sum", FieldType::int());

    // int[] squares = new int[n];
    // for (int i = 0; i < n; i++) squares[i] = i * i;
    // int sum = 0;
    // for (int i = 0; i < n; i++) sum += squares[i];
    // return sum;
    let loop_over = |body| {
        for_(
            vec![declare(i, Some(int(0)))],
            Some(binary(BinaryOperator::Lt, tb.read(i), tb.read(n))),
            vec![increment(tb.read(i), IncrementKind::PostIncrement)],
            body,
        )
    };
    let body = vec![
        declare(squares, Some(new_array(FieldType::int(), tb.read(n)))),
        loop_over(expression(assign(
            array_element(tb.read(squares), tb.read(i)),
            binary(BinaryOperator::Mul, tb.read(i), tb.read(i)),
        ))),
        declare(sum, Some(int(0))),
        loop_over(expression(tb.compound(
            tb.read(sum),
            BinaryOperator::Add,
            array_element(tb.read(squares), tb.read(i)),
        ))),
        return_(Some(tb.read(sum))),
    ];
    let output = compile_default(&bindings, unit(class, vec![tb.declaration(f, vec![n], body)]));
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(machine.call(&bindings, f, &[Value::Int(0)]).int(), 0);
    assert_eq!(machine.call(&bindings, f, &[Value::Int(4)]).int(), 14);
}

#[test]
fn string_concatenation() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let string = FieldType::object(bindings.java.string);

    // String f(int n) { return "n=" + n + "!"; }
    let f = static_method(&tb, class, "f", vec![FieldType::int()], Some(string));
    let n = tb.argument("n", FieldType::int());
    let value = tb.concat(tb.concat(tb.string("n="), tb.read(n)), tb.string("!"));
    let f_declaration = tb.declaration(f, vec![n], vec![return_(Some(value))]);

    // String g(int n) { String s = "a"; s += n; return s; }
    let g = static_method(&tb, class, "g", vec![FieldType::int()], Some(string));
    let n = tb.argument("n", FieldType::int());
    let s = tb.local("s", string);
    let g_declaration = tb.declaration(
        g,
        vec![n],
        vec![
            declare(s, Some(tb.string("a"))),
            expression(tb.compound(tb.read(s), BinaryOperator::Add, tb.read(n))),
            return_(Some(tb.read(s))),
        ],
    );

    // String h(boolean b, long l) { return b + ":" + l; }
    let h = static_method(
        &tb,
        class,
        "h",
        vec![FieldType::boolean(), FieldType::long()],
        Some(string),
    );
    let b = tb.argument("b", FieldType::boolean());
    let l = tb.argument("l", FieldType::long());
    let value = tb.concat(tb.concat(tb.read(b), tb.string(":")), tb.read(l));
    let h_declaration = tb.declaration(h, vec![b, l], vec![return_(Some(value))]);

    let output = compile_default(
        &bindings,
        unit(class, vec![f_declaration, g_declaration, h_declaration]),
    );
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(machine.call(&bindings, f, &[Value::Int(5)]).string(), "n=5!");
    assert_eq!(machine.call(&bindings, g, &[Value::Int(5)]).string(), "a5");
    assert_eq!(
        machine
            .call(&bindings, h, &[Value::Int(1), Value::Long(-40)])
            .string(),
        "true:-40"
    );
}

#[test]
fn long_string_literals_are_split() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let string = FieldType::object(bindings.java.string);
    let f = static_method(&tb, class, "f", vec![], Some(string));

    let long: String = (0..69_999).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let output = compile_default(
        &bindings,
        unit(class, vec![tb.declaration(f, vec![], vec![return_(Some(tb.string(&long)))])]),
    );
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let loads = count_plain(code(&output, &bindings, f), |insn| matches!(insn, Instruction::Ldc(_)));
    assert!(loads >= 2);

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(machine.call(&bindings, f, &[]).string(), long);
}

/// `class Outer { private int secret; private static int twice(int x) { return 2 * x; }
///   private Outer() {}  class Inner { ... } }`
#[test]
fn private_members_go_through_accessors() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let outer = tb.class("Outer");
    let inner = tb.nested_class("Outer$Inner", outer);
    let outer_type = FieldType::object(outer);
    let secret = tb.field(outer, "secret", FieldType::int(), FieldAccessFlags::PRIVATE);

    tb.start_method();
    let twice = tb.method(
        outer,
        "twice",
        vec![FieldType::int()],
        Some(FieldType::int()),
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC,
    );
    let x = tb.argument("x", FieldType::int());
    let twice_declaration = tb.declaration(
        twice,
        vec![x],
        vec![return_(Some(binary(BinaryOperator::Mul, int(2), tb.read(x))))],
    );

    tb.start_method();
    let constructor = tb.method(outer, "<init>", vec![], None, MethodAccessFlags::PRIVATE);
    let constructor_declaration = tb.declaration(constructor, vec![], vec![]);

    // static int peek(Outer o) { return o.secret; }
    let peek = static_method(&tb, inner, "peek", vec![outer_type], Some(FieldType::int()));
    let o = tb.argument("o", outer_type);
    let peek_declaration = tb.declaration(
        peek,
        vec![o],
        vec![return_(Some(tb.field_ref(Some(tb.read(o)), secret)))],
    );

    // static void poke(Outer o, int v) { o.secret = v; }
    let poke = static_method(&tb, inner, "poke", vec![outer_type, FieldType::int()], None);
    let o = tb.argument("o", outer_type);
    let v = tb.argument("v", FieldType::int());
    let poke_declaration = tb.declaration(
        poke,
        vec![o, v],
        vec![expression(assign(tb.field_ref(Some(tb.read(o)), secret), tb.read(v)))],
    );

    // static int call(int a) { return twice(a) + 1; }
    let call = static_method(&tb, inner, "call", vec![FieldType::int()], Some(FieldType::int()));
    let a = tb.argument("a", FieldType::int());
    let call_declaration = tb.declaration(
        call,
        vec![a],
        vec![return_(Some(binary(
            BinaryOperator::Add,
            tb.call(Receiver::Implicit, twice, vec![tb.read(a)]),
            int(1),
        )))],
    );

    // static Outer make() { return new Outer(); }
    let make = static_method(&tb, inner, "make", vec![], Some(outer_type));
    let make_declaration = tb.declaration(
        make,
        vec![],
        vec![return_(Some(tb.new_object(constructor, vec![])))],
    );

    let inner_declaration = type_declaration(
        inner,
        vec![],
        vec![peek_declaration, poke_declaration, call_declaration, make_declaration],
        vec![],
    );
    let unit = CompilationUnit {
        types: vec![type_declaration(
            outer,
            vec![field_declaration(secret, None)],
            vec![twice_declaration, constructor_declaration],
            vec![inner_declaration],
        )],
    };
    let output = compile_default(&bindings, unit);
    assert!(!output.failed);
    assert!(output
        .diagnostics
        .iter()
        .all(|diagnostic| diagnostic.kind == ProblemKind::SyntheticAccessEmulation));
    assert_eq!(output.diagnostics.len(), 4);
    assert_all_stacks_consistent(&output);

    // One accessor per member and use, all on the outer class
    let outer_output = output.class(outer).expect("outer class was generated");
    let accessors: Vec<&str> = outer_output
        .methods
        .iter()
        .map(|method| bindings.method(method.method).name.as_str())
        .filter(|name| name.starts_with("access$"))
        .collect();
    assert_eq!(accessors.len(), 4);

    // Nothing in the nested class touches the private members directly
    let (peek_method, inner_constants) = compiled(&output, &bindings, peek);
    let calls: Vec<&str> = instructions(peek_method.code.as_ref().unwrap())
        .iter()
        .filter_map(|insn| match insn {
            DecodedInstruction::Plain(Instruction::Invoke(_, method)) => {
                inner_constants.member_name(*method)
            }
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("access$"));
    assert_eq!(
        count_plain(peek_method.code.as_ref().unwrap(), |insn| matches!(
            insn,
            Instruction::GetField(_)
        )),
        0
    );

    let mut machine = Machine::new(&output, &bindings);
    let object = Value::Object(String::from("Outer"));
    machine.fields.insert(String::from("Outer.secret"), Value::Int(41));
    assert_eq!(machine.call(&bindings, peek, &[object.clone()]).int(), 41);
    assert_eq!(
        machine.call(&bindings, poke, &[object.clone(), Value::Int(99)]),
        Outcome::Returned(None)
    );
    assert_eq!(machine.fields.get("Outer.secret"), Some(&Value::Int(99)));
    assert_eq!(machine.call(&bindings, call, &[Value::Int(20)]).int(), 41);
    assert_eq!(
        machine.call(&bindings, make, &[]),
        Outcome::Returned(Some(object))
    );
}

/// `class Point { static int count = 3; int x = 7; long y; Point(long y) { this.y = y; } }`
#[test]
fn constructors_and_static_initializers() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let point = tb.class("Point");
    let count = tb.field(point, "count", FieldType::int(), FieldAccessFlags::STATIC);
    let x = tb.field(point, "x", FieldType::int(), FieldAccessFlags::empty());
    let y_field = tb.field(point, "y", FieldType::long(), FieldAccessFlags::empty());

    tb.start_method();
    let init = tb.method(
        point,
        "<init>",
        vec![FieldType::long()],
        None,
        MethodAccessFlags::PUBLIC,
    );
    let y = tb.argument("y", FieldType::long());
    let body = vec![expression(assign(
        tb.field_ref(Some(tb.this(point)), y_field),
        tb.read(y),
    ))];
    let unit = CompilationUnit {
        types: vec![type_declaration(
            point,
            vec![
                field_declaration(count, Some(int(3))),
                field_declaration(x, Some(int(7))),
                field_declaration(y_field, None),
            ],
            vec![tb.declaration(init, vec![y], body)],
            vec![],
        )],
    };
    let output = compile_default(&bindings, unit);
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    // super() comes first
    let decoded = instructions(code(&output, &bindings, init));
    assert!(matches!(decoded[0], DecodedInstruction::Plain(Instruction::ALoad(0))));
    assert!(matches!(
        decoded[1],
        DecodedInstruction::Plain(Instruction::Invoke(jcodegen::jvm::InvokeType::Special, _))
    ));

    let mut machine = Machine::new(&output, &bindings);
    let object = Value::Object(String::from("Point"));
    assert_eq!(
        machine.call(&bindings, init, &[object, Value::Long(9)]),
        Outcome::Returned(None)
    );
    assert_eq!(machine.fields.get("Point.x"), Some(&Value::Int(7)));
    assert_eq!(machine.fields.get("Point.y"), Some(&Value::Long(9)));
    assert_eq!(machine.fields.get("Point.count"), None);

    let point_output = output.class(point).expect("class was generated");
    let clinit = point_output
        .methods
        .iter()
        .find(|method| bindings.method(method.method).name == "<clinit>")
        .expect("static initializer was generated");
    assert!(bindings.method(clinit.method).access_flags.contains(MethodAccessFlags::STATIC));
    let clinit_code = clinit.code.as_ref().unwrap();
    assert_eq!(
        machine.run(clinit_code, &point_output.constants, &[]),
        Outcome::Returned(None)
    );
    assert_eq!(machine.fields.get("Point.count"), Some(&Value::Int(3)));
}

#[test]
fn classes_without_static_fields_get_no_static_initializer() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let f = static_method(&tb, class, "f", vec![], Some(FieldType::int()));
    let output = compile_default(
        &bindings,
        unit(class, vec![tb.declaration(f, vec![], vec![return_(Some(int(1)))])]),
    );
    let methods = &output.class(class).unwrap().methods;
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].method, f);
}

#[test]
fn stubs_throw_the_configured_class() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");
    let f = static_method(&tb, class, "f", vec![], Some(FieldType::int()));
    let mut declaration = tb.declaration(f, vec![], vec![return_(Some(int(1)))]);
    declaration.problems.push(String::from("Type mismatch: cannot convert from String to int"));

    let settings = jcodegen::codegen::Settings {
        problem_class: String::from("com/example/CompileError"),
        ..Default::default()
    };
    let output = compile(&bindings, &settings, unit(class, vec![declaration]));
    let (stub, constants) = compiled(&output, &bindings, f);
    assert!(stub.is_stub);
    let stub_code = stub.code.as_ref().unwrap();
    assert_stack_consistent(stub_code, constants);

    let strings: Vec<&str> = instructions(stub_code)
        .iter()
        .filter_map(|insn| match insn {
            DecodedInstruction::Plain(Instruction::Ldc(index)) => constants.string_value(*index),
            _ => None,
        })
        .collect();
    assert_eq!(strings.len(), 1);
    assert!(strings[0].starts_with("Unresolved compilation problem"));
    assert!(strings[0].contains("cannot convert from String to int"));
    assert_eq!(
        count_branches(stub_code, |branch| matches!(branch, BranchInstruction::AThrow)),
        1
    );

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(
        machine.call(&bindings, f, &[]),
        Outcome::Threw(String::from("com/example/CompileError"))
    );
}

#[test]
fn numeric_casts() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let class = tb.class("A");

    // int narrow(long a) { return (int) a; }
    let narrow = static_method(&tb, class, "narrow", vec![FieldType::long()], Some(FieldType::int()));
    let a = tb.argument("a", FieldType::long());
    let narrow_declaration = tb.declaration(
        narrow,
        vec![a],
        vec![return_(Some(cast(tb.read(a), FieldType::int())))],
    );

    // long widen(int a) { return (long) a * 3000000000L; }
    let widen = static_method(&tb, class, "widen", vec![FieldType::int()], Some(FieldType::long()));
    let a = tb.argument("a", FieldType::int());
    let widen_declaration = tb.declaration(
        widen,
        vec![a],
        vec![return_(Some(binary(
            BinaryOperator::Mul,
            cast(tb.read(a), FieldType::long()),
            long(3_000_000_000),
        )))],
    );

    // int to_byte(int a) { return (byte) a; }
    let to_byte = static_method(&tb, class, "to_byte", vec![FieldType::int()], Some(FieldType::int()));
    let a = tb.argument("a", FieldType::int());
    let byte = FieldType::Base(jcodegen::jvm::BaseType::Byte);
    let to_byte_declaration = tb.declaration(
        to_byte,
        vec![a],
        vec![return_(Some(cast(tb.read(a), byte)))],
    );

    let output = compile_default(
        &bindings,
        unit(class, vec![narrow_declaration, widen_declaration, to_byte_declaration]),
    );
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let mut machine = Machine::new(&output, &bindings);
    assert_eq!(machine.call(&bindings, narrow, &[Value::Long(0x1_0000_0007)]).int(), 7);
    assert_eq!(machine.call(&bindings, narrow, &[Value::Long(-5)]).int(), -5);
    assert_eq!(
        machine.call(&bindings, widen, &[Value::Int(-3)]).long(),
        -9_000_000_000
    );
    assert_eq!(machine.call(&bindings, to_byte, &[Value::Int(200)]).int(), -56);
    assert_eq!(machine.call(&bindings, to_byte, &[Value::Int(127)]).int(), 127);
}

/// `class Base { int b; Base(int v) { b = v; } }`
/// `class Derived extends Base { int d = 5; Derived(int v) { super(v * 2); } }`
#[test]
fn explicit_super_call_comes_before_field_initializers() {
    let bindings = BindingTable::new();
    let tb = TreeBuilder::new(&bindings);
    let base = tb.class("Base");
    let derived = bindings.add_class(jcodegen::binding::ClassData {
        name: String::from("Derived"),
        superclass: Some(base),
        enclosing: None,
        access_flags: jcodegen::jvm::ClassAccessFlags::PUBLIC | jcodegen::jvm::ClassAccessFlags::SUPER,
    });
    let b = tb.field(base, "b", FieldType::int(), FieldAccessFlags::empty());
    let d = tb.field(derived, "d", FieldType::int(), FieldAccessFlags::empty());

    tb.start_method();
    let base_init = tb.method(base, "<init>", vec![FieldType::int()], None, MethodAccessFlags::PUBLIC);
    let v = tb.argument("v", FieldType::int());
    let base_declaration = tb.declaration(
        base_init,
        vec![v],
        vec![expression(assign(tb.field_ref(None, b), tb.read(v)))],
    );

    tb.start_method();
    let derived_init =
        tb.method(derived, "<init>", vec![FieldType::int()], None, MethodAccessFlags::PUBLIC);
    let v = tb.argument("v", FieldType::int());
    let derived_declaration = tb.declaration(
        derived_init,
        vec![v],
        vec![super_call(
            base_init,
            vec![binary(BinaryOperator::Mul, tb.read(v), int(2))],
        )],
    );

    let unit = CompilationUnit {
        types: vec![
            type_declaration(base, vec![field_declaration(b, None)], vec![base_declaration], vec![]),
            type_declaration(
                derived,
                vec![field_declaration(d, Some(int(5)))],
                vec![derived_declaration],
                vec![],
            ),
        ],
    };
    let output = compile_default(&bindings, unit);
    assert!(output.diagnostics.is_empty());
    assert_all_stacks_consistent(&output);

    let decoded = instructions(code(&output, &bindings, derived_init));
    let position = |wanted: fn(&DecodedInstruction) -> bool| {
        decoded.iter().position(wanted).expect("instruction is there")
    };
    let super_call_at = position(|insn| {
        matches!(insn, DecodedInstruction::Plain(Instruction::Invoke(..)))
    });
    let initializer_at = position(|insn| {
        matches!(insn, DecodedInstruction::Plain(Instruction::PutField(_)))
    });
    assert!(super_call_at < initializer_at);
    assert_eq!(
        decoded
            .iter()
            .filter(|insn| matches!(insn, DecodedInstruction::Plain(Instruction::Invoke(..))))
            .count(),
        1
    );

    let mut machine = Machine::new(&output, &bindings);
    let object = Value::Object(String::from("Derived"));
    assert_eq!(
        machine.call(&bindings, derived_init, &[object, Value::Int(4)]),
        Outcome::Returned(None)
    );
    assert_eq!(machine.fields.get("Base.b"), Some(&Value::Int(8)));
    assert_eq!(machine.fields.get("Derived.d"), Some(&Value::Int(5)));
}
