use super::{StackType, VerifierErrorKind};
use crate::jvm::code::{BranchInstruction, Instruction};
use crate::jvm::TypeKind;
use crate::util::Width;

/// Operand stack, with the top of the stack at the end
pub type Stack = Vec<StackType>;

/// Apply the stack effect of a straight-line instruction
pub fn verify_instruction(stack: &mut Stack, insn: &Instruction) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use StackType::*;

    match insn {
        Nop | IInc(_, _) => (),
        AConstNull => stack.push(Reference),
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => stack.push(Int),
        LConst0 | LConst1 => stack.push(Long),
        FConst0 | FConst1 | FConst2 => stack.push(Float),
        DConst0 | DConst1 => stack.push(Double),
        BiPush(_) | SiPush(_) => stack.push(Int),
        Ldc(constant) => push_kind(stack, constant.kind()),

        ILoad(_) => stack.push(Int),
        LLoad(_) => stack.push(Long),
        FLoad(_) => stack.push(Float),
        DLoad(_) => stack.push(Double),
        ALoad(_) => stack.push(Reference),

        IStore(_) => pop_expecting_type(stack, Int)?,
        LStore(_) => pop_expecting_type(stack, Long)?,
        FStore(_) => pop_expecting_type(stack, Float)?,
        DStore(_) => pop_expecting_type(stack, Double)?,
        AStore(_) => pop_expecting_type(stack, Reference)?,

        IALoad | BALoad | CALoad | SALoad => array_load(stack, Int)?,
        LALoad => array_load(stack, Long)?,
        FALoad => array_load(stack, Float)?,
        DALoad => array_load(stack, Double)?,
        AALoad => array_load(stack, Reference)?,

        IAStore | BAStore | CAStore | SAStore => array_store(stack, Int)?,
        LAStore => array_store(stack, Long)?,
        FAStore => array_store(stack, Float)?,
        DAStore => array_store(stack, Double)?,
        AAStore => array_store(stack, Reference)?,

        Pop => {
            take_slots(stack, 1)?;
        }
        Pop2 => {
            take_slots(stack, 2)?;
        }
        Dup => duplicate(stack, 1, 0)?,
        DupX1 => duplicate(stack, 1, 1)?,
        DupX2 => duplicate(stack, 1, 2)?,
        Dup2 => duplicate(stack, 2, 0)?,
        Dup2X1 => duplicate(stack, 2, 1)?,
        Dup2X2 => duplicate(stack, 2, 2)?,
        Swap => {
            let top = take_slots(stack, 1)?;
            let below = take_slots(stack, 1)?;
            stack.extend(top);
            stack.extend(below);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => binary(stack, Int)?,
        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => binary(stack, Long)?,
        FAdd | FSub | FDiv | FMul | FRem => binary(stack, Float)?,
        DAdd | DSub | DDiv | DMul | DRem => binary(stack, Double)?,

        LSh(_) => {
            pop_expecting_type(stack, Int)?;
            pop_expecting_type(stack, Long)?;
            stack.push(Long);
        }

        INeg => convert(stack, Int, Int)?,
        LNeg => convert(stack, Long, Long)?,
        FNeg => convert(stack, Float, Float)?,
        DNeg => convert(stack, Double, Double)?,

        I2L => convert(stack, Int, Long)?,
        I2F => convert(stack, Int, Float)?,
        I2D => convert(stack, Int, Double)?,
        L2I => convert(stack, Long, Int)?,
        L2F => convert(stack, Long, Float)?,
        L2D => convert(stack, Long, Double)?,
        F2I => convert(stack, Float, Int)?,
        F2L => convert(stack, Float, Long)?,
        F2D => convert(stack, Float, Double)?,
        D2I => convert(stack, Double, Int)?,
        D2L => convert(stack, Double, Long)?,
        D2F => convert(stack, Double, Float)?,
        I2B | I2C | I2S => convert(stack, Int, Int)?,

        LCmp => compare(stack, Long)?,
        FCmp(_) => compare(stack, Float)?,
        DCmp(_) => compare(stack, Double)?,

        GetStatic(field) => push_kind(stack, field.kind()),
        PutStatic(field) => pop_kind(stack, field.kind())?,
        GetField(field) => {
            pop_expecting_type(stack, Reference)?;
            push_kind(stack, field.kind());
        }
        PutField(field) => {
            pop_kind(stack, field.kind())?;
            pop_expecting_type(stack, Reference)?;
        }

        Invoke(typ, method) => {
            for parameter in method.descriptor.parameters.iter().rev() {
                pop_kind(stack, TypeKind::from(parameter))?;
            }
            if typ.has_receiver() {
                pop_expecting_type(stack, Reference)?;
            }
            push_kind(stack, method.descriptor.return_kind());
        }

        New(_) => stack.push(Reference),
        NewArray(_) | ANewArray(_) => convert(stack, Int, Reference)?,
        ArrayLength => convert(stack, Reference, Int)?,
        CheckCast(_) => convert(stack, Reference, Reference)?,
        InstanceOf(_) => convert(stack, Reference, Int)?,
        MonitorEnter | MonitorExit => pop_expecting_type(stack, Reference)?,
    }

    Ok(())
}

/// Apply the stack effect of a branch instruction (before any jump happens)
pub fn verify_branch(stack: &mut Stack, insn: &BranchInstruction) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use StackType::*;

    match insn {
        If(_, _) | TableSwitch { .. } | LookupSwitch { .. } | IReturn => {
            pop_expecting_type(stack, Int)?
        }
        IfICmp(_, _) => {
            pop_expecting_type(stack, Int)?;
            pop_expecting_type(stack, Int)?;
        }
        IfACmp(_, _) => {
            pop_expecting_type(stack, Reference)?;
            pop_expecting_type(stack, Reference)?;
        }
        IfNull(_, _) | AReturn | AThrow => pop_expecting_type(stack, Reference)?,
        Goto(_) | Return => (),
        LReturn => pop_expecting_type(stack, Long)?,
        FReturn => pop_expecting_type(stack, Float)?,
        DReturn => pop_expecting_type(stack, Double)?,
    }

    Ok(())
}

fn push_kind(stack: &mut Stack, kind: TypeKind) {
    if let Some(typ) = StackType::of(kind) {
        stack.push(typ);
    }
}

fn pop_kind(stack: &mut Stack, kind: TypeKind) -> Result<(), VerifierErrorKind> {
    match StackType::of(kind) {
        Some(typ) => pop_expecting_type(stack, typ),
        None => Ok(()),
    }
}

fn binary(stack: &mut Stack, typ: StackType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, typ)?;
    pop_expecting_type(stack, typ)?;
    stack.push(typ);
    Ok(())
}

fn compare(stack: &mut Stack, typ: StackType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, typ)?;
    pop_expecting_type(stack, typ)?;
    stack.push(StackType::Int);
    Ok(())
}

fn convert(stack: &mut Stack, from: StackType, to: StackType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, from)?;
    stack.push(to);
    Ok(())
}

fn array_load(stack: &mut Stack, element: StackType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, StackType::Int)?;
    pop_expecting_type(stack, StackType::Reference)?;
    stack.push(element);
    Ok(())
}

fn array_store(stack: &mut Stack, element: StackType) -> Result<(), VerifierErrorKind> {
    pop_expecting_type(stack, element)?;
    pop_expecting_type(stack, StackType::Int)?;
    pop_expecting_type(stack, StackType::Reference)?;
    Ok(())
}

fn pop(stack: &mut Stack) -> Result<StackType, VerifierErrorKind> {
    stack.pop().ok_or(VerifierErrorKind::EmptyStack)
}

/// Pop entries covering exactly `slots` slots, returned bottom-first
///
/// Fails if a category 2 value would get split.
fn take_slots(stack: &mut Stack, slots: usize) -> Result<Vec<StackType>, VerifierErrorKind> {
    let mut taken = vec![];
    let mut remaining = slots;
    while remaining > 0 {
        let typ = pop(stack)?;
        let width = typ.width();
        if width > remaining {
            return Err(VerifierErrorKind::InvalidWidth(width));
        }
        remaining -= width;
        taken.push(typ);
    }
    taken.reverse();
    Ok(taken)
}

/// Copy the top `slots` slots and tuck the copy under the next `skip` slots
///
/// Covers every form of the `dup` family.
fn duplicate(stack: &mut Stack, slots: usize, skip: usize) -> Result<(), VerifierErrorKind> {
    let copied = take_slots(stack, slots)?;
    let skipped = take_slots(stack, skip)?;
    stack.extend_from_slice(&copied);
    stack.extend(skipped);
    stack.extend(copied);
    Ok(())
}

fn pop_expecting_type(stack: &mut Stack, expected: StackType) -> Result<(), VerifierErrorKind> {
    let found = pop(stack)?;
    if found == expected {
        Ok(())
    } else {
        Err(VerifierErrorKind::IncompatibleTypes { expected, found })
    }
}
