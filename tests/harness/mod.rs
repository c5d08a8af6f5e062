//! Compile hand-built trees and run what comes out
//!
//! The interpreter here covers what generated code for `int`, `long`, `boolean`, strings, and
//! simple objects needs. Objects don't have identity: a field is stored per class, so every
//! instance of a class shares it.

#![allow(dead_code)]

use jcodegen::ast::CompilationUnit;
use jcodegen::binding::{BindingTable, MethodId};
use jcodegen::codegen::{CompiledMethod, Compiler, Settings, UnitOutput};
use jcodegen::diagnostics::ProblemKind;
use jcodegen::jvm::disassembler::{decode, simulate_stack, DecodedInstruction};
use jcodegen::jvm::{
    BaseType, BranchInstruction, Constant, ConstantIndex, ConstantsPool, EqComparison,
    Instruction, InvokeType, MethodCode, MethodDescriptor, OrdComparison, ParseDescriptor,
    SerializableInstruction, ShiftType,
};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// Compile a single unit
pub fn compile(bindings: &BindingTable, settings: &Settings, unit: CompilationUnit) -> UnitOutput {
    let mut outputs = Compiler::new(bindings, settings).compile(std::slice::from_ref(&unit));
    assert_eq!(outputs.len(), 1);
    outputs.remove(0)
}

pub fn compile_default(bindings: &BindingTable, unit: CompilationUnit) -> UnitOutput {
    compile(bindings, &Settings::default(), unit)
}

/// Generated method, along with the pool of its class
pub fn compiled<'o>(
    output: &'o UnitOutput,
    bindings: &BindingTable,
    method: MethodId,
) -> (&'o CompiledMethod, &'o ConstantsPool) {
    let class = output
        .class(bindings.method(method).class)
        .expect("class was generated");
    let compiled = class.method(method).expect("method was generated");
    (compiled, &class.constants)
}

pub fn code<'o>(output: &'o UnitOutput, bindings: &BindingTable, method: MethodId) -> &'o MethodCode {
    compiled(output, bindings, method)
        .0
        .code
        .as_ref()
        .expect("method has a body")
}

pub fn kinds(output: &UnitOutput) -> Vec<ProblemKind> {
    output.diagnostics.iter().map(|diagnostic| diagnostic.kind).collect()
}

/// Every instruction of a body
pub fn instructions(code: &MethodCode) -> Vec<DecodedInstruction> {
    decode(&code.code)
        .expect("code decodes")
        .into_iter()
        .map(|decoded| decoded.instruction)
        .collect()
}

pub fn count_plain(code: &MethodCode, matches: impl Fn(&SerializableInstruction) -> bool) -> usize {
    instructions(code)
        .iter()
        .filter(|insn| matches!(insn, DecodedInstruction::Plain(plain) if matches(plain)))
        .count()
}

pub fn count_branches(code: &MethodCode, matches: impl Fn(&BranchInstruction<usize>) -> bool) -> usize {
    instructions(code)
        .iter()
        .filter(|insn| matches!(insn, DecodedInstruction::Branch(branch) if matches(branch)))
        .count()
}

/// Check that the recorded `max_stack` is what simulating the code gives
pub fn assert_stack_consistent(code: &MethodCode, constants: &ConstantsPool) {
    let simulated =
        simulate_stack(&code.code, &code.exception_table, constants).expect("stack simulates");
    assert_eq!(simulated, code.max_stack);
}

/// Check every generated method of a unit
pub fn assert_all_stacks_consistent(output: &UnitOutput) {
    for class in &output.classes {
        for method in &class.methods {
            if let Some(code) = &method.code {
                assert_stack_consistent(code, &class.constants);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Int(i32),
    Long(i64),
    Null,
    Str(String),

    /// Instance of a class (named by its binary name)
    Object(String),

    Builder(Rc<RefCell<String>>),
    Array(Rc<RefCell<Vec<Value>>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Builder(a), Value::Builder(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    fn width(&self) -> usize {
        match self {
            Value::Long(_) => 2,
            _ => 1,
        }
    }

    fn int(self) -> i32 {
        match self {
            Value::Int(i) => i,
            other => panic!("expected an int, got {:?}", other),
        }
    }

    fn long(self) -> i64 {
        match self {
            Value::Long(l) => l,
            other => panic!("expected a long, got {:?}", other),
        }
    }

    /// How `String.valueOf` or `StringBuilder.append` show the value
    fn show(&self, descriptor: &str) -> String {
        match (self, descriptor) {
            (Value::Int(i), "C") => char::from_u32(*i as u32).map(String::from).unwrap_or_default(),
            (Value::Int(i), "Z") => (*i != 0).to_string(),
            (Value::Int(i), _) => i.to_string(),
            (Value::Long(l), _) => l.to_string(),
            (Value::Null, _) => String::from("null"),
            (Value::Str(s), _) => s.clone(),
            (Value::Builder(b), _) => b.borrow().clone(),
            (Value::Object(class), _) => format!("{}@0", class),
            (Value::Array(_), _) => String::from("[array]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Returned(Option<Value>),

    /// Uncaught exception, of the given class
    Threw(String),
}

impl Outcome {
    pub fn int(&self) -> i32 {
        match self {
            Outcome::Returned(Some(Value::Int(i))) => *i,
            other => panic!("expected an int result, got {:?}", other),
        }
    }

    pub fn long(&self) -> i64 {
        match self {
            Outcome::Returned(Some(Value::Long(l))) => *l,
            other => panic!("expected a long result, got {:?}", other),
        }
    }

    pub fn boolean(&self) -> bool {
        self.int() != 0
    }

    pub fn string(&self) -> String {
        match self {
            Outcome::Returned(Some(Value::Str(s))) => s.clone(),
            other => panic!("expected a string result, got {:?}", other),
        }
    }
}

const STEP_LIMIT: usize = 10_000_000;

type MethodKey = (String, String, String);

/// Runs generated methods, calling between methods of the same unit
pub struct Machine<'o> {
    methods: HashMap<MethodKey, (&'o MethodCode, &'o ConstantsPool)>,

    /// Field values, by `Class.name`
    pub fields: HashMap<String, Value>,

    steps: usize,
}

enum Step {
    Next,
    Jump(usize),
    Return(Option<Value>),
    Throw(String),
}

impl<'o> Machine<'o> {
    pub fn new(output: &'o UnitOutput, bindings: &BindingTable) -> Machine<'o> {
        let mut methods = HashMap::new();
        for class in &output.classes {
            let class_name = bindings.class(class.class).name.clone();
            for method in &class.methods {
                if let Some(code) = &method.code {
                    let data = bindings.method(method.method);
                    let key = (
                        class_name.clone(),
                        data.name.clone(),
                        bindings.method_descriptor(method.method),
                    );
                    let previous = methods.insert(key, (code, &class.constants));
                    assert!(previous.is_none(), "two methods share a name and descriptor");
                }
            }
        }
        Machine {
            methods,
            fields: HashMap::new(),
            steps: 0,
        }
    }

    /// Call a method of the unit (`args` include the receiver, for instance methods)
    pub fn call(&mut self, bindings: &BindingTable, method: MethodId, args: &[Value]) -> Outcome {
        let data = bindings.method(method);
        let key = (
            bindings.class(data.class).name.clone(),
            data.name.clone(),
            bindings.method_descriptor(method),
        );
        let (code, constants) = *self.methods.get(&key).expect("method has code");
        self.run(code, constants, args)
    }

    pub fn run(&mut self, code: &MethodCode, constants: &ConstantsPool, args: &[Value]) -> Outcome {
        let decoded = decode(&code.code).expect("code decodes");
        let index_of: HashMap<usize, usize> = decoded
            .iter()
            .enumerate()
            .map(|(idx, insn)| (insn.position, idx))
            .collect();

        let mut locals: Vec<Option<Value>> = vec![None; code.max_locals as usize];
        let mut slot = 0;
        for arg in args {
            locals[slot] = Some(arg.clone());
            slot += arg.width();
        }
        let mut stack: Vec<Value> = vec![];
        let mut pc = 0;

        loop {
            self.steps += 1;
            assert!(self.steps < STEP_LIMIT, "step limit reached");

            let insn = &decoded[*index_of.get(&pc).expect("pc is on an instruction")];
            let step = match &insn.instruction {
                DecodedInstruction::Plain(plain) => {
                    self.execute(plain, &mut stack, &mut locals, constants)
                }
                DecodedInstruction::Branch(branch) => Self::branch(branch, &mut stack),
            };
            assert!(
                stack.len() <= code.max_stack as usize,
                "stack deeper than max_stack"
            );
            pc = match step {
                Step::Next => insn.position + insn.width,
                Step::Jump(target) => target,
                Step::Return(value) => return Outcome::Returned(value),
                Step::Throw(class) => {
                    let handler = code.exception_table.iter().find(|entry| {
                        entry.start <= pc
                            && pc < entry.end
                            && match entry.catch_type {
                                None => true,
                                Some(catch) => {
                                    let catch = constants.class_name(catch.into()).unwrap_or("");
                                    catch == class || catch == "java/lang/Throwable"
                                }
                            }
                    });
                    match handler {
                        Some(entry) => {
                            stack.clear();
                            stack.push(Value::Object(class));
                            entry.handler
                        }
                        None => return Outcome::Threw(class),
                    }
                }
            };
        }
    }

    fn branch(branch: &BranchInstruction<usize>, stack: &mut Vec<Value>) -> Step {
        let pop = |stack: &mut Vec<Value>| stack.pop().expect("stack underflow");
        let jump_if = |holds: bool, target: usize| {
            if holds {
                Step::Jump(target)
            } else {
                Step::Next
            }
        };
        match branch {
            BranchInstruction::If(comparison, target) => {
                let value = pop(stack).int();
                jump_if(ord_holds(*comparison, value.cmp(&0)), *target)
            }
            BranchInstruction::IfICmp(comparison, target) => {
                let right = pop(stack).int();
                let left = pop(stack).int();
                jump_if(ord_holds(*comparison, left.cmp(&right)), *target)
            }
            BranchInstruction::IfACmp(comparison, target) => {
                let right = pop(stack);
                let left = pop(stack);
                jump_if(eq_holds(*comparison, left == right), *target)
            }
            BranchInstruction::IfNull(comparison, target) => {
                let value = pop(stack);
                jump_if(eq_holds(*comparison, value == Value::Null), *target)
            }
            BranchInstruction::Goto(target) | BranchInstruction::GotoW(target) => Step::Jump(*target),
            BranchInstruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                let key = i64::from(pop(stack).int());
                let idx = key - i64::from(*low);
                if idx >= 0 && (idx as usize) < targets.len() {
                    Step::Jump(targets[idx as usize])
                } else {
                    Step::Jump(*default)
                }
            }
            BranchInstruction::LookupSwitch { default, targets } => {
                let key = pop(stack).int();
                let target = targets
                    .iter()
                    .find(|(case, _)| *case == key)
                    .map(|(_, target)| *target)
                    .unwrap_or(*default);
                Step::Jump(target)
            }
            BranchInstruction::IReturn | BranchInstruction::LReturn | BranchInstruction::AReturn => {
                Step::Return(Some(pop(stack)))
            }
            BranchInstruction::Return => Step::Return(None),
            BranchInstruction::AThrow => match pop(stack) {
                Value::Object(class) => Step::Throw(class),
                Value::Null => Step::Throw(String::from("java/lang/NullPointerException")),
                other => panic!("throwing {:?}", other),
            },
            other => panic!("unsupported branch {:?}", other),
        }
    }

    fn execute(
        &mut self,
        insn: &SerializableInstruction,
        stack: &mut Vec<Value>,
        locals: &mut [Option<Value>],
        constants: &ConstantsPool,
    ) -> Step {
        macro_rules! pop {
            () => {
                stack.pop().expect("stack underflow")
            };
        }
        macro_rules! int_op {
            ($f:expr) => {{
                let right = pop!().int();
                let left = pop!().int();
                stack.push(Value::Int($f(left, right)));
            }};
        }
        macro_rules! long_op {
            ($f:expr) => {{
                let right = pop!().long();
                let left = pop!().long();
                stack.push(Value::Long($f(left, right)));
            }};
        }
        let arithmetic = String::from("java/lang/ArithmeticException");

        match insn {
            Instruction::Nop => (),
            Instruction::AConstNull => stack.push(Value::Null),
            Instruction::IConstM1 => stack.push(Value::Int(-1)),
            Instruction::IConst0 => stack.push(Value::Int(0)),
            Instruction::IConst1 => stack.push(Value::Int(1)),
            Instruction::IConst2 => stack.push(Value::Int(2)),
            Instruction::IConst3 => stack.push(Value::Int(3)),
            Instruction::IConst4 => stack.push(Value::Int(4)),
            Instruction::IConst5 => stack.push(Value::Int(5)),
            Instruction::LConst0 => stack.push(Value::Long(0)),
            Instruction::LConst1 => stack.push(Value::Long(1)),
            Instruction::BiPush(b) => stack.push(Value::Int(i32::from(*b))),
            Instruction::SiPush(s) => stack.push(Value::Int(i32::from(*s))),
            Instruction::Ldc(index) | Instruction::Ldc2(index) => {
                stack.push(load_constant(constants, *index))
            }
            Instruction::ILoad(n) | Instruction::LLoad(n) | Instruction::ALoad(n) => {
                let value = locals[*n as usize].clone().expect("local is initialized");
                stack.push(value);
            }
            Instruction::IStore(n) | Instruction::LStore(n) | Instruction::AStore(n) => {
                locals[*n as usize] = Some(pop!());
            }
            Instruction::Pop => {
                pop!();
            }
            Instruction::Pop2 => {
                if pop!().width() == 1 {
                    pop!();
                }
            }
            Instruction::Dup => {
                let top = pop!();
                stack.push(top.clone());
                stack.push(top);
            }
            Instruction::DupX1 => {
                let top = pop!();
                let under = pop!();
                stack.push(top.clone());
                stack.push(under);
                stack.push(top);
            }
            Instruction::DupX2 => {
                let top = pop!();
                let under = pop!();
                if under.width() == 2 {
                    stack.push(top.clone());
                    stack.push(under);
                } else {
                    let bottom = pop!();
                    stack.push(top.clone());
                    stack.push(bottom);
                    stack.push(under);
                }
                stack.push(top);
            }
            Instruction::Dup2 => {
                let top = pop!();
                if top.width() == 2 {
                    stack.push(top.clone());
                    stack.push(top);
                } else {
                    let under = pop!();
                    stack.push(under.clone());
                    stack.push(top.clone());
                    stack.push(under);
                    stack.push(top);
                }
            }
            Instruction::Dup2X1 => {
                let top = pop!();
                assert_eq!(top.width(), 2, "dup2_x1 only supported on longs");
                let under = pop!();
                stack.push(top.clone());
                stack.push(under);
                stack.push(top);
            }
            Instruction::Swap => {
                let top = pop!();
                let under = pop!();
                stack.push(top);
                stack.push(under);
            }
            Instruction::IAdd => int_op!(i32::wrapping_add),
            Instruction::ISub => int_op!(i32::wrapping_sub),
            Instruction::IMul => int_op!(i32::wrapping_mul),
            Instruction::IDiv | Instruction::IRem => {
                let right = pop!().int();
                let left = pop!().int();
                if right == 0 {
                    return Step::Throw(arithmetic);
                }
                let result = if matches!(insn, Instruction::IDiv) {
                    left.wrapping_div(right)
                } else {
                    left.wrapping_rem(right)
                };
                stack.push(Value::Int(result));
            }
            Instruction::INeg => {
                let value = pop!().int();
                stack.push(Value::Int(value.wrapping_neg()));
            }
            Instruction::IAnd => int_op!(|a, b| a & b),
            Instruction::IOr => int_op!(|a, b| a | b),
            Instruction::IXor => int_op!(|a, b| a ^ b),
            Instruction::ISh(shift) => {
                let amount = (pop!().int() & 31) as u32;
                let value = pop!().int();
                let result = match shift {
                    ShiftType::Left => value.wrapping_shl(amount),
                    ShiftType::ArithmeticRight => value >> amount,
                    ShiftType::LogicalRight => ((value as u32) >> amount) as i32,
                };
                stack.push(Value::Int(result));
            }
            Instruction::LAdd => long_op!(i64::wrapping_add),
            Instruction::LSub => long_op!(i64::wrapping_sub),
            Instruction::LMul => long_op!(i64::wrapping_mul),
            Instruction::LDiv | Instruction::LRem => {
                let right = pop!().long();
                let left = pop!().long();
                if right == 0 {
                    return Step::Throw(arithmetic);
                }
                let result = if matches!(insn, Instruction::LDiv) {
                    left.wrapping_div(right)
                } else {
                    left.wrapping_rem(right)
                };
                stack.push(Value::Long(result));
            }
            Instruction::LNeg => {
                let value = pop!().long();
                stack.push(Value::Long(value.wrapping_neg()));
            }
            Instruction::LAnd => long_op!(|a, b| a & b),
            Instruction::LOr => long_op!(|a, b| a | b),
            Instruction::LXor => long_op!(|a, b| a ^ b),
            Instruction::LSh(shift) => {
                let amount = (pop!().int() & 63) as u32;
                let value = pop!().long();
                let result = match shift {
                    ShiftType::Left => value.wrapping_shl(amount),
                    ShiftType::ArithmeticRight => value >> amount,
                    ShiftType::LogicalRight => ((value as u64) >> amount) as i64,
                };
                stack.push(Value::Long(result));
            }
            Instruction::IInc(n, delta) => {
                let value = locals[*n as usize].clone().expect("local is initialized").int();
                locals[*n as usize] = Some(Value::Int(value.wrapping_add(i32::from(*delta))));
            }
            Instruction::I2L => {
                let value = pop!().int();
                stack.push(Value::Long(i64::from(value)));
            }
            Instruction::L2I => {
                let value = pop!().long();
                stack.push(Value::Int(value as i32));
            }
            Instruction::I2B => {
                let value = pop!().int();
                stack.push(Value::Int(i32::from(value as i8)));
            }
            Instruction::I2C => {
                let value = pop!().int();
                stack.push(Value::Int(i32::from(value as u16)));
            }
            Instruction::I2S => {
                let value = pop!().int();
                stack.push(Value::Int(i32::from(value as i16)));
            }
            Instruction::LCmp => {
                let right = pop!().long();
                let left = pop!().long();
                let result = match left.cmp(&right) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                };
                stack.push(Value::Int(result));
            }
            Instruction::GetStatic(field) | Instruction::GetField(field) => {
                if matches!(insn, Instruction::GetField(_)) {
                    pop!();
                }
                let key = field_key(constants, *field);
                let value = self
                    .fields
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| default_value(constants.member_descriptor(*field).unwrap_or("")));
                stack.push(value);
            }
            Instruction::PutStatic(field) | Instruction::PutField(field) => {
                let value = pop!();
                if matches!(insn, Instruction::PutField(_)) {
                    pop!();
                }
                self.fields.insert(field_key(constants, *field), value);
            }
            Instruction::New(class) => {
                let name = constants.class_name((*class).into()).expect("class constant");
                if name == "java/lang/StringBuilder" {
                    stack.push(Value::Builder(Rc::new(RefCell::new(String::new()))));
                } else {
                    stack.push(Value::Object(name.to_string()));
                }
            }
            Instruction::NewArray(base) => {
                let length = pop!().int();
                if length < 0 {
                    return Step::Throw(String::from("java/lang/NegativeArraySizeException"));
                }
                let element = match base {
                    BaseType::Long => Value::Long(0),
                    _ => Value::Int(0),
                };
                let elements = vec![element; length as usize];
                stack.push(Value::Array(Rc::new(RefCell::new(elements))));
            }
            Instruction::ANewArray(_) => {
                let length = pop!().int();
                let elements = vec![Value::Null; length.max(0) as usize];
                stack.push(Value::Array(Rc::new(RefCell::new(elements))));
            }
            Instruction::ArrayLength => match pop!() {
                Value::Array(array) => stack.push(Value::Int(array.borrow().len() as i32)),
                _ => return Step::Throw(String::from("java/lang/NullPointerException")),
            },
            Instruction::IALoad
            | Instruction::LALoad
            | Instruction::AALoad
            | Instruction::BALoad
            | Instruction::CALoad
            | Instruction::SALoad => {
                let index = pop!().int();
                let array = match pop!() {
                    Value::Array(array) => array,
                    _ => return Step::Throw(String::from("java/lang/NullPointerException")),
                };
                let element = array.borrow().get(index as usize).cloned();
                match element {
                    Some(element) if index >= 0 => stack.push(element),
                    _ => {
                        return Step::Throw(String::from(
                            "java/lang/ArrayIndexOutOfBoundsException",
                        ))
                    }
                }
            }
            Instruction::IAStore
            | Instruction::LAStore
            | Instruction::AAStore
            | Instruction::BAStore
            | Instruction::CAStore
            | Instruction::SAStore => {
                let value = pop!();
                let index = pop!().int();
                let array = match pop!() {
                    Value::Array(array) => array,
                    _ => return Step::Throw(String::from("java/lang/NullPointerException")),
                };
                let mut array = array.borrow_mut();
                if index < 0 || index as usize >= array.len() {
                    return Step::Throw(String::from("java/lang/ArrayIndexOutOfBoundsException"));
                }
                array[index as usize] = value;
            }
            Instruction::CheckCast(_) => (),
            Instruction::InstanceOf(_) => {
                let value = pop!();
                stack.push(Value::Int(if value == Value::Null { 0 } else { 1 }));
            }
            Instruction::Invoke(invoke_type, method) => {
                return self.invoke(*invoke_type, *method, stack, constants)
            }
            other => panic!("unsupported instruction {:?}", other),
        }
        Step::Next
    }

    fn invoke(
        &mut self,
        invoke_type: InvokeType,
        method: ConstantIndex,
        stack: &mut Vec<Value>,
        constants: &ConstantsPool,
    ) -> Step {
        let class = constants.member_class(method).expect("method ref").to_string();
        let name = constants.member_name(method).expect("method ref").to_string();
        let descriptor = constants.member_descriptor(method).expect("method ref").to_string();
        let parsed = MethodDescriptor::<String>::parse(&descriptor).expect("valid descriptor");

        let mut args: Vec<Value> = (0..parsed.parameters.len())
            .map(|_| stack.pop().expect("stack underflow"))
            .collect();
        args.reverse();
        if invoke_type != InvokeType::Static {
            args.insert(0, stack.pop().expect("stack underflow"));
        }

        match (class.as_str(), name.as_str()) {
            ("java/lang/StringBuilder", "<init>") => {
                if let (Value::Builder(builder), Some(initial)) = (&args[0], args.get(1)) {
                    *builder.borrow_mut() = initial.show("");
                }
                return Step::Next;
            }
            ("java/lang/StringBuilder", "append") => {
                let param = &descriptor[1..descriptor.find(')').unwrap_or(1)];
                if let Value::Builder(builder) = &args[0] {
                    builder.borrow_mut().push_str(&args[1].show(param));
                }
                stack.push(args[0].clone());
                return Step::Next;
            }
            ("java/lang/StringBuilder", "toString") => {
                stack.push(Value::Str(args[0].show("")));
                return Step::Next;
            }
            ("java/lang/String", "valueOf") => {
                let param = &descriptor[1..descriptor.find(')').unwrap_or(1)];
                stack.push(Value::Str(args[0].show(param)));
                return Step::Next;
            }
            _ => (),
        }

        let key = (class, name.clone(), descriptor);
        match self.methods.get(&key).copied() {
            Some((code, constants)) => match self.run(code, constants, &args) {
                Outcome::Returned(Some(value)) => {
                    stack.push(value);
                    Step::Next
                }
                Outcome::Returned(None) => Step::Next,
                Outcome::Threw(class) => Step::Throw(class),
            },
            // Constructors outside of the unit (eg. `Object.<init>`) do nothing
            None if name == "<init>" => Step::Next,
            None => panic!("call to unknown method {:?}", key),
        }
    }
}

fn ord_holds(comparison: OrdComparison, ordering: Ordering) -> bool {
    match comparison {
        OrdComparison::EQ => ordering == Ordering::Equal,
        OrdComparison::NE => ordering != Ordering::Equal,
        OrdComparison::LT => ordering == Ordering::Less,
        OrdComparison::LE => ordering != Ordering::Greater,
        OrdComparison::GT => ordering == Ordering::Greater,
        OrdComparison::GE => ordering != Ordering::Less,
    }
}

fn eq_holds(comparison: EqComparison, equal: bool) -> bool {
    match comparison {
        EqComparison::EQ => equal,
        EqComparison::NE => !equal,
    }
}

fn load_constant(constants: &ConstantsPool, index: ConstantIndex) -> Value {
    match constants.get(index) {
        Some(Constant::Integer(i)) => Value::Int(*i),
        Some(Constant::Long(l)) => Value::Long(*l),
        Some(Constant::String(_)) => {
            Value::Str(constants.string_value(index).expect("string constant").to_string())
        }
        other => panic!("unsupported constant {:?}", other),
    }
}

fn field_key(constants: &ConstantsPool, field: ConstantIndex) -> String {
    format!(
        "{}.{}",
        constants.member_class(field).expect("field ref"),
        constants.member_name(field).expect("field ref")
    )
}

fn default_value(descriptor: &str) -> Value {
    match descriptor {
        "J" => Value::Long(0),
        "B" | "C" | "I" | "S" | "Z" => Value::Int(0),
        _ => Value::Null,
    }
}
