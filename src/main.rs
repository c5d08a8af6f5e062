use jcodegen::ast::builder::*;
use jcodegen::ast::{BinaryOperator, CompilationUnit, IncrementKind, MethodDeclaration, Statement};
use jcodegen::binding::{BindingTable, ClassId, LocalId, MethodId, TypeRef};
use jcodegen::codegen::{Compiler, Settings};
use jcodegen::jvm::{disassembler, FieldAccessFlags, FieldType, MethodAccessFlags};

use clap::{App, Arg};
use std::io;

/// Tree put together by hand, standing in for the output of a resolver
struct Sample {
    name: &'static str,
    about: &'static str,
    build: fn(&TreeBuilder<'_>) -> CompilationUnit,
}

const SAMPLES: &[Sample] = &[
    Sample {
        name: "uninitialized",
        about: "local read on a path where it was never assigned (becomes a stub)",
        build: uninitialized,
    },
    Sample {
        name: "short-circuit",
        about: "`a > 0 && b > 0 || a == b` as a returned boolean",
        build: short_circuit,
    },
    Sample {
        name: "loop-sum",
        about: "`for` loop summing up to a bound",
        build: loop_sum,
    },
    Sample {
        name: "switch-table",
        about: "`switch` over dense keys",
        build: switch_table,
    },
    Sample {
        name: "switch-lookup",
        about: "`switch` over sparse keys",
        build: switch_lookup,
    },
    Sample {
        name: "wide-jump",
        about: "loop body too long for 16-bit jump offsets",
        build: wide_jump,
    },
    Sample {
        name: "try-finally",
        about: "`try`/`catch`/`finally` around a division",
        build: try_finally,
    },
    Sample {
        name: "long-string",
        about: "string literal too long for a single constant",
        build: long_string,
    },
    Sample {
        name: "code-too-large",
        about: "method body over 65535 bytes (becomes a stub)",
        build: code_too_large,
    },
    Sample {
        name: "accessor",
        about: "nested class reading a private field of its enclosing class",
        build: accessor,
    },
    Sample {
        name: "constructor",
        about: "constructor with instance and static field initializers",
        build: constructor,
    },
];

fn main() -> io::Result<()> {
    env_logger::init();

    let matches = App::new("Java-like bytecode generator")
        .version("0.1.0")
        .about("Generates JVM method bodies for sample resolved trees")
        .arg(
            Arg::with_name("list")
                .long("list")
                .help("Lists the available samples"),
        )
        .arg(
            Arg::with_name("sample")
                .long("sample")
                .value_name("NAME")
                .help("Sample to compile (all of them if omitted)")
                .takes_value(true)
                .multiple(true),
        )
        .arg(
            Arg::with_name("wide")
                .long("wide")
                .help("Uses 32-bit jump offsets from the start"),
        )
        .arg(
            Arg::with_name("disassemble")
                .long("disassemble")
                .help("Prints the instructions of every method"),
        )
        .get_matches();

    if matches.is_present("list") {
        for sample in SAMPLES {
            println!("{:<16}{}", sample.name, sample.about);
        }
        return Ok(());
    }

    let selected: Vec<&Sample> = match matches.values_of("sample") {
        None => SAMPLES.iter().collect(),
        Some(names) => names
            .map(|name| {
                SAMPLES
                    .iter()
                    .find(|sample| sample.name == name)
                    .ok_or_else(|| {
                        let msg = format!("Unknown sample '{}' (try --list)", name);
                        io::Error::new(io::ErrorKind::InvalidInput, msg)
                    })
            })
            .collect::<io::Result<_>>()?,
    };

    let settings = Settings {
        force_wide_jumps: matches.is_present("wide"),
        ..Settings::default()
    };

    for sample in selected {
        log::info!("Compiling sample '{}'", sample.name);
        let bindings = BindingTable::new();
        let unit = (sample.build)(&TreeBuilder::new(&bindings));
        let outputs = Compiler::new(&bindings, &settings).compile(std::slice::from_ref(&unit));

        println!("== {}", sample.name);
        for output in &outputs {
            for diagnostic in output.diagnostics.iter() {
                println!("  {:?} {}", diagnostic.severity(), diagnostic);
            }
            if output.failed {
                println!("  (unit abandoned)");
            }
            for class in &output.classes {
                for compiled in &class.methods {
                    let method = bindings.method(compiled.method);
                    let code = match &compiled.code {
                        Some(code) => code,
                        None => continue,
                    };
                    println!(
                        "  {}.{}{}: {} bytes, max_stack={}, max_locals={}{}",
                        bindings.class(class.class).name,
                        method.name,
                        bindings.method_descriptor(compiled.method),
                        code.code.len(),
                        code.max_stack,
                        code.max_locals,
                        if compiled.is_stub { " (stub)" } else { "" }
                    );
                    for entry in &code.exception_table {
                        println!(
                            "    handler [{}, {}) -> {} catching {}",
                            entry.start,
                            entry.end,
                            entry.handler,
                            entry
                                .catch_type
                                .and_then(|catch| class.constants.class_name(catch.into()))
                                .unwrap_or("any")
                        );
                    }
                    if matches.is_present("disassemble") {
                        for line in disassembler::render(&code.code, &class.constants)?.lines() {
                            println!("    {}", line);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn int_type() -> TypeRef {
    FieldType::int()
}

fn static_method(
    tb: &TreeBuilder<'_>,
    class: ClassId,
    name: &str,
    parameters: Vec<TypeRef>,
    return_type: Option<TypeRef>,
) -> MethodId {
    tb.start_method();
    tb.method(
        class,
        name,
        parameters,
        return_type,
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    )
}

fn single_method_unit(
    class: ClassId,
    method: MethodDeclaration,
) -> CompilationUnit {
    CompilationUnit {
        types: vec![type_declaration(class, vec![], vec![method], vec![])],
    }
}

/// `static int f(boolean b) { int x; if (b) x = 1; return x; }`
fn uninitialized(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("Uninitialized");
    let f = static_method(tb, class, "f", vec![FieldType::boolean()], Some(int_type()));
    let b = tb.argument("b", FieldType::boolean());
    let x = tb.local("x", int_type());
    let body = vec![
        declare(x, None).at_line(1),
        if_(tb.read(b), expression(tb.assign_local(x, int(1))), None).at_line(2),
        return_(Some(tb.read(x))).at_line(3),
    ];
    single_method_unit(class, tb.declaration(f, vec![b], body))
}

/// `static boolean f(int a, int b) { return a > 0 && b > 0 || a == b; }`
fn short_circuit(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("ShortCircuit");
    let f = static_method(tb, class, "f", vec![int_type(), int_type()], Some(FieldType::boolean()));
    let a = tb.argument("a", int_type());
    let b = tb.argument("b", int_type());
    let condition = binary(
        BinaryOperator::OrOr,
        binary(
            BinaryOperator::AndAnd,
            binary(BinaryOperator::Gt, tb.read(a), int(0)),
            binary(BinaryOperator::Gt, tb.read(b), int(0)),
        ),
        binary(BinaryOperator::Eq, tb.read(a), tb.read(b)),
    );
    let body = vec![return_(Some(condition)).at_line(1)];
    single_method_unit(class, tb.declaration(f, vec![a, b], body))
}

/// `static int sum(int n) { int s = 0; for (int i = 0; i < n; i++) s += i; return s; }`
fn loop_sum(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("LoopSum");
    let sum = static_method(tb, class, "sum", vec![int_type()], Some(int_type()));
    let n = tb.argument("n", int_type());
    let s = tb.local("s", int_type());
    let i = tb.local("i", int_type());
    let body = vec![
        declare(s, Some(int(0))).at_line(1),
        for_(
            vec![declare(i, Some(int(0)))],
            Some(binary(BinaryOperator::Lt, tb.read(i), tb.read(n))),
            vec![increment(tb.read(i), IncrementKind::PostIncrement)],
            expression(tb.compound(tb.read(s), BinaryOperator::Add, tb.read(i))).at_line(3),
        )
        .at_line(2),
        return_(Some(tb.read(s))).at_line(4),
    ];
    single_method_unit(class, tb.declaration(sum, vec![n], body))
}

/// `switch (k) { case <key>: return <value>; ... default: return 0; }`
fn switch_over(tb: &TreeBuilder<'_>, class_name: &str, keys: &[(i32, i32)]) -> CompilationUnit {
    let class = tb.class(class_name);
    let f = static_method(tb, class, "f", vec![int_type()], Some(int_type()));
    let k = tb.argument("k", int_type());
    let mut cases: Vec<_> = keys
        .iter()
        .map(|(key, value)| case(vec![*key], false, vec![return_(Some(int(*value)))]))
        .collect();
    cases.push(case(vec![], true, vec![return_(Some(int(0)))]));
    let body = vec![switch(tb.read(k), cases).at_line(1)];
    single_method_unit(class, tb.declaration(f, vec![k], body))
}

fn switch_table(tb: &TreeBuilder<'_>) -> CompilationUnit {
    switch_over(tb, "SwitchTable", &[(1, 10), (2, 20), (3, 30), (4, 40)])
}

fn switch_lookup(tb: &TreeBuilder<'_>) -> CompilationUnit {
    switch_over(tb, "SwitchLookup", &[(-5, 1), (1000, 2), (1_000_000, 3)])
}

/// `x = x * 31 + y;` repeated `count` times
fn mixing_statements(
    tb: &TreeBuilder<'_>,
    x: LocalId,
    y: LocalId,
    count: usize,
) -> Vec<Statement> {
    (0..count)
        .map(|_| {
            let mixed = binary(
                BinaryOperator::Add,
                binary(BinaryOperator::Mul, tb.read(x), int(31)),
                tb.read(y),
            );
            expression(tb.assign_local(x, mixed))
        })
        .collect()
}

/// `while (n > 0) { x = x * 31 + n; ... n--; }` with a body of about 35000 bytes
fn wide_jump(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("WideJump");
    let f = static_method(tb, class, "f", vec![int_type()], Some(int_type()));
    let n = tb.argument("n", int_type());
    let x = tb.local("x", int_type());
    let mut loop_body = mixing_statements(tb, x, n, 5000);
    loop_body.push(expression(increment(tb.read(n), IncrementKind::PostDecrement)));
    let body = vec![
        declare(x, Some(int(0))),
        while_(
            binary(BinaryOperator::Gt, tb.read(n), int(0)),
            block(loop_body),
        ),
        return_(Some(tb.read(x))),
    ];
    single_method_unit(class, tb.declaration(f, vec![n], body))
}

/// `static int f(int a) { int r = 0; try { r = 10 / a; } catch (Throwable t) { r = -1; }
/// finally { r = r + 1; } return r; }`
fn try_finally(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("TryFinally");
    let f = static_method(tb, class, "f", vec![int_type()], Some(int_type()));
    let a = tb.argument("a", int_type());
    let r = tb.local("r", int_type());
    let t = tb.local("t", FieldType::object(tb.bindings.java.throwable));
    let body = vec![
        declare(r, Some(int(0))).at_line(1),
        try_(
            vec![expression(
                tb.assign_local(r, binary(BinaryOperator::Div, int(10), tb.read(a))),
            )
            .at_line(2)],
            vec![catch(
                t,
                tb.bindings.java.throwable,
                vec![expression(tb.assign_local(r, int(-1))).at_line(3)],
            )],
            Some(vec![expression(
                tb.assign_local(r, binary(BinaryOperator::Add, tb.read(r), int(1))),
            )
            .at_line(4)]),
        ),
        return_(Some(tb.read(r))).at_line(5),
    ];
    single_method_unit(class, tb.declaration(f, vec![a], body))
}

/// `static String f() { return "abcabc..."; }` with 70000 characters
fn long_string(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("LongString");
    let string = FieldType::object(tb.bindings.java.string);
    let f = static_method(tb, class, "f", vec![], Some(string));
    let literal = "abc".repeat(70_000 / 3);
    let body = vec![return_(Some(tb.string(&literal)))];
    single_method_unit(class, tb.declaration(f, vec![], body))
}

/// `static int f(int y) { int x = 0; x = x * 31 + y; ... return x; }` with 10000 statements
fn code_too_large(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let class = tb.class("CodeTooLarge");
    let f = static_method(tb, class, "f", vec![int_type()], Some(int_type()));
    let y = tb.argument("y", int_type());
    let x = tb.local("x", int_type());
    let mut body = vec![declare(x, Some(int(0)))];
    body.extend(mixing_statements(tb, x, y, 10_000));
    body.push(return_(Some(tb.read(x))));
    single_method_unit(class, tb.declaration(f, vec![y], body))
}

/// `class Outer { private int secret; class Inner { int peek(Outer o) { return o.secret; } } }`
fn accessor(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let outer = tb.class("Outer");
    let inner = tb.nested_class("Outer$Inner", outer);
    let secret = tb.field(outer, "secret", int_type(), FieldAccessFlags::PRIVATE);

    tb.start_method();
    let peek = tb.method(
        inner,
        "peek",
        vec![FieldType::object(outer)],
        Some(int_type()),
        MethodAccessFlags::empty(),
    );
    let o = tb.argument("o", FieldType::object(outer));
    let body = vec![return_(Some(tb.field_ref(Some(tb.read(o)), secret))).at_line(1)];
    let inner_declaration = type_declaration(
        inner,
        vec![],
        vec![tb.declaration(peek, vec![o], body)],
        vec![],
    );
    CompilationUnit {
        types: vec![type_declaration(
            outer,
            vec![field_declaration(secret, None)],
            vec![],
            vec![inner_declaration],
        )],
    }
}

/// `class Point { static int count = 3; int x = 7; long y; Point(long y) { this.y = y; } }`
fn constructor(tb: &TreeBuilder<'_>) -> CompilationUnit {
    let point = tb.class("Point");
    let count = tb.field(point, "count", int_type(), FieldAccessFlags::STATIC);
    let x = tb.field(point, "x", int_type(), FieldAccessFlags::empty());
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
    ))
    .at_line(2)];
    CompilationUnit {
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
    }
}
