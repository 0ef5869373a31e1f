//! Small stack machine for running woven units in tests
//!
//! It understands enough of the instruction set to run the kind of code the tests assemble (and
//! the checks woven into it). Calls to `NullnessRuntimeVerifier.checkNotNull` go to the real
//! [`NullnessVerifier`], with the machine's call stack as the live stack.

#![allow(dead_code)]

pub mod assemble;

use qualweave::checkers::nullness::NullnessVerifier;
use qualweave::jvm::code::{
    BranchInstruction, CodeElement, Constant, EqComparison, FieldRef, Instruction, InvokeType,
    MethodRef, OrdComparison,
};
use qualweave::jvm::model::{ClassModel, MethodModel};
use qualweave::jvm::{BinaryName, FieldType, Name, TypeKind, UnqualifiedName};
use qualweave::runtime::{AttributionKind, RuntimeVerifier, StackFrame, ViolationError};
use std::collections::HashMap;
use std::fmt;

/// Route library logs to the test output (`RUST_LOG=debug` to see policy decisions)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Long(i64),
    Str(String),
    Object(usize),
    Array(usize),
    Attribution(AttributionKind),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn default_for(field_type: &FieldType) -> Value {
        match TypeKind::from(field_type) {
            TypeKind::Long => Value::Long(0),
            TypeKind::Reference => Value::Null,
            _ => Value::Int(0),
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_))
    }
}

#[derive(Debug)]
pub enum MachineError {
    /// A check failed and the handler terminated the call
    Violation(ViolationError),
    NoSuchClass(BinaryName),
    NoSuchMethod(MethodRef),
    NullPointer(String),
    Unsupported(String),
    StackUnderflow,
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineError::Violation(err) => err.fmt(f),
            MachineError::NoSuchClass(name) => write!(f, "no such class {}", name),
            MachineError::NoSuchMethod(method) => write!(f, "no such method {}", method),
            MachineError::NullPointer(what) => write!(f, "null pointer in {}", what),
            MachineError::Unsupported(what) => write!(f, "unsupported: {}", what),
            MachineError::StackUnderflow => f.write_str("operand stack underflow"),
        }
    }
}

impl std::error::Error for MachineError {}

struct Object {
    class: BinaryName,
    fields: HashMap<UnqualifiedName, Value>,
}

pub struct Machine<'v> {
    classes: HashMap<BinaryName, ClassModel>,
    statics: HashMap<(BinaryName, UnqualifiedName), Value>,
    objects: Vec<Object>,
    arrays: Vec<Vec<Value>>,
    verifier: &'v RuntimeVerifier,

    /// Call stack, outermost first
    frames: Vec<StackFrame>,
}

impl<'v> Machine<'v> {
    pub fn new(verifier: &'v RuntimeVerifier) -> Machine<'v> {
        Machine {
            classes: HashMap::new(),
            statics: HashMap::new(),
            objects: vec![],
            arrays: vec![],
            verifier,
            frames: vec![],
        }
    }

    pub fn load(&mut self, class: ClassModel) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn with(mut self, class: ClassModel) -> Machine<'v> {
        self.load(class);
        self
    }

    pub fn new_object(&mut self, class: &BinaryName) -> Value {
        self.objects.push(Object {
            class: class.clone(),
            fields: HashMap::new(),
        });
        Value::Object(self.objects.len() - 1)
    }

    pub fn new_array(&mut self, elements: Vec<Value>) -> Value {
        self.arrays.push(elements);
        Value::Array(self.arrays.len() - 1)
    }

    pub fn array(&self, array: &Value) -> Option<&[Value]> {
        match array {
            Value::Array(index) => self.arrays.get(*index).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn get_static(&self, owner: &str, name: &str) -> Value {
        let key = (
            BinaryName::from_str(owner).unwrap(),
            UnqualifiedName::from_str(name).unwrap(),
        );
        self.statics.get(&key).cloned().unwrap_or(Value::Null)
    }

    pub fn field(&self, object: &Value, name: &str) -> Value {
        let name = UnqualifiedName::from_str(name).unwrap();
        match object {
            Value::Object(index) => self.objects[*index]
                .fields
                .get(&name)
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Call a static method
    pub fn invoke_static(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, MachineError> {
        let method = assemble::method_ref(owner, name, descriptor);
        self.invoke(InvokeType::Static, &method, arguments)
    }

    /// Call an instance method (the receiver is the first argument)
    pub fn invoke_virtual(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, MachineError> {
        let method = assemble::method_ref(owner, name, descriptor);
        self.invoke(InvokeType::Virtual, &method, arguments)
    }

    /// Find the class declaring the implementation, walking up from `start`
    fn resolve(&self, start: &BinaryName, method: &MethodRef) -> Option<(BinaryName, usize)> {
        let mut current = Some(start.clone());
        while let Some(name) = current {
            let class = self.classes.get(&name)?;
            let found = class.methods.iter().position(|candidate| {
                candidate.name == method.name
                    && candidate.descriptor == method.descriptor
                    && candidate.code.is_some()
            });
            if let Some(index) = found {
                return Some((name, index));
            }
            current = class.superclass.clone();
        }
        None
    }

    fn invoke(
        &mut self,
        invoke_type: InvokeType,
        method: &MethodRef,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, MachineError> {
        if method.owner == BinaryName::NULLNESSRUNTIMEVERIFIER
            && method.name == UnqualifiedName::CHECKNOTNULL
        {
            return self.check_not_null(arguments).map(|_| None);
        }

        let start = match (invoke_type, arguments.first()) {
            (InvokeType::Static, _) | (InvokeType::Special, _) => method.owner.clone(),
            (_, Some(Value::Object(index))) => self.objects[*index].class.clone(),
            (_, Some(Value::Null)) => return Err(MachineError::NullPointer(method.to_string())),
            _ => method.owner.clone(),
        };

        let (owner, index) = match self.resolve(&start, method) {
            Some(found) => found,
            None if method.name == UnqualifiedName::INIT => return Ok(None),
            None => return Err(MachineError::NoSuchMethod(method.clone())),
        };
        let class = self.classes[&owner].clone();
        let target = class.methods[index].clone();

        let mut frame = StackFrame::new(class.name.as_str(), target.name.as_str());
        frame.file = class.source_file.clone();
        self.frames.push(frame);
        let result = self.execute(&target, arguments);
        self.frames.pop();
        result
    }

    fn check_not_null(&mut self, mut arguments: Vec<Value>) -> Result<(), MachineError> {
        let attribution = if arguments.len() == 3 {
            match arguments.pop() {
                Some(Value::Attribution(kind)) => kind,
                other => return Err(MachineError::Unsupported(format!("attribution {:?}", other))),
            }
        } else {
            AttributionKind::Local
        };
        let message = match arguments.pop() {
            Some(Value::Str(message)) => message,
            other => return Err(MachineError::Unsupported(format!("message {:?}", other))),
        };
        let value = arguments.pop().ok_or(MachineError::StackUnderflow)?;

        let stack: Vec<StackFrame> = self.frames.iter().rev().cloned().collect();
        NullnessVerifier::check_not_null(
            self.verifier,
            value.is_null(),
            &message,
            attribution,
            &stack,
        )
        .map_err(MachineError::Violation)
    }

    fn execute(
        &mut self,
        method: &MethodModel,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, MachineError> {
        let code = match &method.code {
            Some(code) => code,
            None => return Err(MachineError::Unsupported(method.signature())),
        };

        let mut locals = vec![Value::Null; code.max_locals as usize];
        let mut slot = 0;
        for argument in arguments {
            let width = if argument.is_wide() { 2 } else { 1 };
            locals[slot] = argument;
            slot += width;
        }

        let labels: HashMap<_, _> = code
            .elements
            .iter()
            .enumerate()
            .filter_map(|(index, element)| match element {
                CodeElement::Label(label) => Some((*label, index)),
                _ => None,
            })
            .collect();

        let mut stack: Vec<Value> = vec![];
        let mut pc = 0;
        while pc < code.elements.len() {
            let element = &code.elements[pc];
            pc += 1;
            match element {
                CodeElement::Label(_) => (),
                CodeElement::LineNumber(line) => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.line = Some(*line as u32);
                    }
                }
                CodeElement::Instruction(instruction) => {
                    self.step(instruction, &mut stack, &mut locals)?;
                }
                CodeElement::Branch(branch) => {
                    let jump = match branch {
                        BranchInstruction::Goto(label) => Some(*label),
                        BranchInstruction::IfNull(comparison, label) => {
                            let is_null = pop(&mut stack)?.is_null();
                            let taken = match comparison {
                                EqComparison::EQ => is_null,
                                EqComparison::NE => !is_null,
                            };
                            if taken {
                                Some(*label)
                            } else {
                                None
                            }
                        }
                        BranchInstruction::If(comparison, label) => {
                            let value = pop_int(&mut stack)?;
                            if compare(*comparison, value, 0) {
                                Some(*label)
                            } else {
                                None
                            }
                        }
                        BranchInstruction::IfICmp(comparison, label) => {
                            let right = pop_int(&mut stack)?;
                            let left = pop_int(&mut stack)?;
                            if compare(*comparison, left, right) {
                                Some(*label)
                            } else {
                                None
                            }
                        }
                        BranchInstruction::Return => return Ok(None),
                        BranchInstruction::IReturn
                        | BranchInstruction::LReturn
                        | BranchInstruction::AReturn => return Ok(Some(pop(&mut stack)?)),
                        other => return Err(MachineError::Unsupported(format!("{:?}", other))),
                    };
                    if let Some(label) = jump {
                        pc = labels[&label];
                    }
                }
            }
        }
        Err(MachineError::Unsupported(format!(
            "fell off the end of {}",
            method.signature()
        )))
    }

    fn step(
        &mut self,
        instruction: &Instruction,
        stack: &mut Vec<Value>,
        locals: &mut [Value],
    ) -> Result<(), MachineError> {
        match instruction {
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
            Instruction::BiPush(value) => stack.push(Value::Int(*value as i32)),
            Instruction::SiPush(value) => stack.push(Value::Int(*value as i32)),
            Instruction::Ldc(Constant::String(value)) => stack.push(Value::Str(value.clone())),
            Instruction::Ldc(Constant::Integer(value)) => stack.push(Value::Int(*value)),
            Instruction::Ldc(Constant::Long(value)) => stack.push(Value::Long(*value)),
            Instruction::ILoad(slot) | Instruction::LLoad(slot) | Instruction::ALoad(slot) => {
                stack.push(locals[*slot as usize].clone());
            }
            Instruction::IStore(slot) | Instruction::LStore(slot) | Instruction::AStore(slot) => {
                locals[*slot as usize] = pop(stack)?;
            }
            Instruction::Pop => {
                pop(stack)?;
            }
            Instruction::Pop2 => {
                if !pop(stack)?.is_wide() {
                    pop(stack)?;
                }
            }
            Instruction::Dup => {
                let top = stack.last().cloned().ok_or(MachineError::StackUnderflow)?;
                stack.push(top);
            }
            Instruction::DupX1 => {
                let first = pop(stack)?;
                let second = pop(stack)?;
                stack.push(first.clone());
                stack.push(second);
                stack.push(first);
            }
            Instruction::Swap => {
                let first = pop(stack)?;
                let second = pop(stack)?;
                stack.push(first);
                stack.push(second);
            }
            Instruction::IAdd => {
                let right = pop_int(stack)?;
                let left = pop_int(stack)?;
                stack.push(Value::Int(left.wrapping_add(right)));
            }
            Instruction::LAdd => match (pop(stack)?, pop(stack)?) {
                (Value::Long(right), Value::Long(left)) => {
                    stack.push(Value::Long(left.wrapping_add(right)))
                }
                other => return Err(MachineError::Unsupported(format!("ladd {:?}", other))),
            },
            Instruction::GetStatic(field) => {
                let value = self.read_static(field);
                stack.push(value);
            }
            Instruction::PutStatic(field) => {
                let value = pop(stack)?;
                self.statics
                    .insert((field.owner.clone(), field.name.clone()), value);
            }
            Instruction::GetField(field) => {
                let object = self.object_index(pop(stack)?, field)?;
                let value = self.objects[object]
                    .fields
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| Value::default_for(&field.descriptor));
                stack.push(value);
            }
            Instruction::PutField(field) => {
                let value = pop(stack)?;
                let object = self.object_index(pop(stack)?, field)?;
                self.objects[object].fields.insert(field.name.clone(), value);
            }
            Instruction::New(class) => {
                let object = self.new_object(class);
                stack.push(object);
            }
            Instruction::ANewArray(_) => {
                let length = pop_int(stack)?;
                let array = self.new_array(vec![Value::Null; length.max(0) as usize]);
                stack.push(array);
            }
            Instruction::ArrayLength => {
                let array = pop(stack)?;
                let length = self
                    .array(&array)
                    .ok_or_else(|| MachineError::NullPointer(String::from("arraylength")))?
                    .len();
                stack.push(Value::Int(length as i32));
            }
            Instruction::AALoad => {
                let index = pop_int(stack)? as usize;
                let array = self.array_index(pop(stack)?)?;
                let value = self.arrays[array].get(index).cloned().ok_or_else(|| {
                    MachineError::Unsupported(format!("array index {} out of bounds", index))
                })?;
                stack.push(value);
            }
            Instruction::AAStore => {
                let value = pop(stack)?;
                let index = pop_int(stack)? as usize;
                let array = self.array_index(pop(stack)?)?;
                match self.arrays[array].get_mut(index) {
                    Some(element) => *element = value,
                    None => {
                        let message = format!("array index {} out of bounds", index);
                        return Err(MachineError::Unsupported(message));
                    }
                }
            }
            Instruction::CheckCast(_) => (),
            Instruction::Invoke(invoke_type, method) => {
                let mut count = method.descriptor.parameters.len();
                if invoke_type.has_receiver() {
                    count += 1;
                }
                if stack.len() < count {
                    return Err(MachineError::StackUnderflow);
                }
                let arguments = stack.split_off(stack.len() - count);
                if let Some(result) = self.invoke(*invoke_type, method, arguments)? {
                    stack.push(result);
                }
            }
            other => return Err(MachineError::Unsupported(format!("{:?}", other))),
        }
        Ok(())
    }

    fn read_static(&self, field: &FieldRef) -> Value {
        if field.owner == BinaryName::ATTRIBUTIONKIND {
            return if field.name == UnqualifiedName::CALLER {
                Value::Attribution(AttributionKind::Caller)
            } else {
                Value::Attribution(AttributionKind::Local)
            };
        }
        self.statics
            .get(&(field.owner.clone(), field.name.clone()))
            .cloned()
            .unwrap_or_else(|| Value::default_for(&field.descriptor))
    }

    fn object_index(&self, value: Value, field: &FieldRef) -> Result<usize, MachineError> {
        match value {
            Value::Object(index) => Ok(index),
            _ => Err(MachineError::NullPointer(field.to_string())),
        }
    }

    fn array_index(&self, value: Value) -> Result<usize, MachineError> {
        match value {
            Value::Array(index) => Ok(index),
            _ => Err(MachineError::NullPointer(String::from("array access"))),
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, MachineError> {
    stack.pop().ok_or(MachineError::StackUnderflow)
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i32, MachineError> {
    match pop(stack)? {
        Value::Int(value) => Ok(value),
        other => Err(MachineError::Unsupported(format!("expected int, got {:?}", other))),
    }
}

fn compare(comparison: OrdComparison, left: i32, right: i32) -> bool {
    match comparison {
        OrdComparison::EQ => left == right,
        OrdComparison::NE => left != right,
        OrdComparison::LT => left < right,
        OrdComparison::GE => left >= right,
        OrdComparison::GT => left > right,
        OrdComparison::LE => left <= right,
    }
}
