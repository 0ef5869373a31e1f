mod machine;

use machine::assemble::*;
use machine::{Machine, MachineError, Value};
use qualweave::agent::{EnforcementMode, LoadContext, RuntimeAgent, Settings};
use qualweave::jvm::code::{BranchInstruction, CodeElement, Constant, Instruction, InvokeType};
use qualweave::jvm::codec::{ClassCodec, UnitImageCodec};
use qualweave::jvm::model::ClassModel;
use qualweave::jvm::{FieldAccessFlags, MethodAccessFlags};
use qualweave::resolution::{ClassResolver, MapResolver};
use qualweave::runtime::{
    AttributionKind, RecordingViolationHandler, ReportingViolationHandler, RuntimeVerifier,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Weave a class the way the load hook would, with `library` visible to lookups
fn weave(settings: &Settings, library: Vec<ClassModel>, class: &ClassModel) -> ClassModel {
    machine::init_logging();
    let resolver: Arc<dyn ClassResolver> = Arc::new(library.into_iter().collect::<MapResolver>());
    let verifier = RuntimeVerifier::new();
    let transformer = RuntimeAgent::install_into(settings, resolver, &verifier).unwrap();
    let bytes = UnitImageCodec.emit(class).unwrap();
    let woven = transformer
        .try_transform(&class.name, &LoadContext::new(), &bytes)
        .unwrap();
    match woven {
        Some(woven) => UnitImageCodec.parse(&woven).unwrap(),
        None => class.clone(),
    }
}

fn checking(classes: &[&str]) -> Settings {
    let mut settings = Settings::new("nullness");
    settings.checked_classes = classes.iter().map(|class| String::from(*class)).collect();
    settings
}

fn recording() -> (Arc<RecordingViolationHandler>, RuntimeVerifier) {
    let handler = Arc::new(RecordingViolationHandler::new());
    let verifier = RuntimeVerifier::with_handler(handler.clone());
    (handler, verifier)
}

/// `lib/Base` is unchecked, and its `getValue` returns `null`
fn base() -> ClassModel {
    let mut base = class("lib/Base", "java/lang/Object");
    base.add_method(method(
        "getValue",
        "()Ljava/lang/String;",
        MethodAccessFlags::PUBLIC,
        1,
        vec![
            insn(Instruction::AConstNull),
            branch(BranchInstruction::AReturn),
        ],
    ));
    base
}

/// `app/Service.f(String)`, with the given annotations on the parameter
fn service(parameter_annotations: Vec<qualweave::jvm::annotations::Annotation>) -> ClassModel {
    let mut service = class("app/Service", "java/lang/Object");
    let mut f = static_method(
        "f",
        "(Ljava/lang/String;)V",
        1,
        vec![branch(BranchInstruction::Return)],
    );
    f.parameter_annotations = vec![parameter_annotations];
    service.add_method(f);
    service
}

/// `lib/Client.call()` passes `null` to `app/Service.f` on line 42
fn client() -> ClassModel {
    let mut client = class("lib/Client", "java/lang/Object");
    client.add_method(static_method(
        "call",
        "()V",
        0,
        vec![
            CodeElement::LineNumber(42),
            insn(Instruction::AConstNull),
            insn(Instruction::Invoke(
                InvokeType::Static,
                method_ref("app/Service", "f", "(Ljava/lang/String;)V"),
            )),
            branch(BranchInstruction::Return),
        ],
    ));
    client
}

#[test]
fn inherited_methods_are_bridged() {
    let sub = weave(&checking(&["app/Sub"]), vec![base()], &class("app/Sub", "lib/Base"));
    let bridge = method_ref("app/Sub", "getValue", "()Ljava/lang/String;");
    assert!(sub.find_method(&bridge.name, &bridge.descriptor).is_some());

    let mut driver = class("test/Driver", "java/lang/Object");
    driver.add_method(static_method(
        "run",
        "(Lapp/Sub;)Ljava/lang/String;",
        1,
        vec![
            CodeElement::LineNumber(7),
            insn(Instruction::ALoad(0)),
            insn(Instruction::Invoke(
                InvokeType::Virtual,
                method_ref("app/Sub", "getValue", "()Ljava/lang/String;"),
            )),
            branch(BranchInstruction::AReturn),
        ],
    ));

    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(base()).with(sub).with(driver);
    let receiver = machine.new_object(&name("app/Sub"));
    let result = machine
        .invoke_static("test/Driver", "run", "(Lapp/Sub;)Ljava/lang/String;", vec![receiver])
        .unwrap();
    assert_eq!(result, Some(Value::Null));

    let violations = handler.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].violation.message,
        "Return value of inherited method getValue must be NonNull"
    );
    let location = violations[0].location.as_ref().unwrap();
    assert_eq!(location.class_name, "test/Driver");
    assert_eq!(location.line, Some(7));
}

#[test]
fn unchecked_subclasses_are_not_bridged() {
    let sub = weave(&checking(&["app/Other"]), vec![base()], &class("app/Sub", "lib/Base"));
    assert!(sub.methods.is_empty());
}

#[test]
fn null_arguments_are_blamed_on_the_caller() {
    let service = weave(&checking(&["app/Service"]), vec![], &service(vec![nonnull()]));
    let verifier = RuntimeVerifier::new();
    let mut machine = Machine::new(&verifier).with(service).with(client());

    let err = match machine.invoke_static("lib/Client", "call", "()V", vec![]) {
        Err(MachineError::Violation(err)) => err,
        other => panic!("expected a violation, got {:?}", other),
    };
    assert_eq!(err.violation.checker, "Nullness");
    assert_eq!(err.violation.message, "Parameter 0 must be NonNull");
    assert_eq!(err.violation.attribution, AttributionKind::Caller);
    let location = err.location.unwrap();
    assert_eq!(location.class_name, "lib/Client");
    assert_eq!(location.method_name, "call");
    assert_eq!(location.location(), "Client.java:42");
}

#[test]
fn unannotated_parameters_are_checked() {
    let service = weave(&checking(&["app/Service"]), vec![], &service(vec![]));
    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(service).with(client());

    machine.invoke_static("lib/Client", "call", "()V", vec![]).unwrap();
    let violations = handler.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].violation.message, "Parameter 0 must be NonNull");
}

#[test]
fn nullable_parameters_are_not_checked() {
    let service = weave(&checking(&["app/Service"]), vec![], &service(vec![nullable()]));
    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(service).with(client());

    machine.invoke_static("lib/Client", "call", "()V", vec![]).unwrap();
    machine
        .invoke_static("app/Service", "f", "(Ljava/lang/String;)V", vec![Value::Null])
        .unwrap();
    assert!(handler.violations().is_empty());
}

#[test]
fn non_null_arguments_pass() {
    let service = weave(&checking(&["app/Service"]), vec![], &service(vec![]));
    let verifier = RuntimeVerifier::new();
    let mut machine = Machine::new(&verifier).with(service);

    let argument = Value::Str(String::from("hello"));
    let result = machine.invoke_static("app/Service", "f", "(Ljava/lang/String;)V", vec![argument]);
    assert!(result.is_ok());
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn reporting_handler_lines() {
    let service = weave(&checking(&["app/Service"]), vec![], &service(vec![]));
    let buffer = SharedBuffer::default();
    let verifier = RuntimeVerifier::with_handler(Arc::new(ReportingViolationHandler::new(
        buffer.clone(),
    )));
    let mut machine = Machine::new(&verifier).with(service).with(client());

    machine.invoke_static("lib/Client", "call", "()V", vec![]).unwrap();
    let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert_eq!(
        output,
        "[VIOLATION] Client.java:42 (Nullness) Parameter 0 must be NonNull\n"
    );
}

/// `lib/Library` is unchecked and declares `static String shared` (opting out if `nullable`)
fn library(nullable_field: bool) -> ClassModel {
    let mut library = class("lib/Library", "java/lang/Object");
    let mut shared = field(
        "shared",
        "Ljava/lang/String;",
        FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
    );
    if nullable_field {
        shared.annotations = vec![nullable()];
    }
    library.add_field(shared);
    library.add_method(static_method(
        "reset",
        "()V",
        0,
        vec![
            CodeElement::LineNumber(20),
            insn(Instruction::AConstNull),
            insn(Instruction::PutStatic(field_ref(
                "lib/Library",
                "shared",
                "Ljava/lang/String;",
            ))),
            branch(BranchInstruction::Return),
        ],
    ));
    library
}

/// `app/Reader.read()` returns `lib/Library.shared`, read on line 12
fn reader() -> ClassModel {
    let mut reader = class("app/Reader", "java/lang/Object");
    reader.add_method(static_method(
        "read",
        "()Ljava/lang/String;",
        0,
        vec![
            CodeElement::LineNumber(12),
            insn(Instruction::GetStatic(field_ref(
                "lib/Library",
                "shared",
                "Ljava/lang/String;",
            ))),
            branch(BranchInstruction::AReturn),
        ],
    ));
    reader
}

#[test]
fn boundary_reads_are_blamed_on_the_reader() {
    let settings = checking(&["app/Reader"]);
    let library = weave(&settings, vec![], &library(false));
    let reader = weave(&settings, vec![library.clone()], &reader());
    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(library).with(reader);

    machine.invoke_static("lib/Library", "reset", "()V", vec![]).unwrap();
    assert!(handler.violations().is_empty());

    let value = machine
        .invoke_static("app/Reader", "read", "()Ljava/lang/String;", vec![])
        .unwrap();
    assert_eq!(value, Some(Value::Null));

    let violations = handler.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].violation.message,
        "Read Field 'shared' must be NonNull"
    );
    let location = violations[0].location.as_ref().unwrap();
    assert_eq!(location.class_name, "app/Reader");
    assert_eq!(location.line, Some(12));
}

#[test]
fn nullable_library_fields_are_trusted() {
    let settings = checking(&["app/Reader"]);
    let reader = weave(&settings, vec![library(true)], &reader());
    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(library(true)).with(reader);

    machine
        .invoke_static("app/Reader", "read", "()Ljava/lang/String;", vec![])
        .unwrap();
    assert!(handler.violations().is_empty());
}

/// `app/Model` is checked and has an unannotated `String name` field
fn model() -> ClassModel {
    let mut model = class("app/Model", "java/lang/Object");
    model.add_field(field("name", "Ljava/lang/String;", FieldAccessFlags::PUBLIC));
    model
}

/// `lib/Mutator.poison(Model)` stores `null` into `model.name` on line 3
fn mutator() -> ClassModel {
    let mut mutator = class("lib/Mutator", "java/lang/Object");
    mutator.add_method(static_method(
        "poison",
        "(Lapp/Model;)V",
        1,
        vec![
            CodeElement::LineNumber(3),
            insn(Instruction::ALoad(0)),
            insn(Instruction::AConstNull),
            insn(Instruction::PutField(field_ref(
                "app/Model",
                "name",
                "Ljava/lang/String;",
            ))),
            branch(BranchInstruction::Return),
        ],
    ));
    mutator
}

fn poison(mode: EnforcementMode) -> Vec<qualweave::runtime::RecordedViolation> {
    let mut settings = checking(&["app/Model"]);
    settings.mode = mode;
    let mutator = weave(&settings, vec![model()], &mutator());

    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(model()).with(mutator);
    let target = machine.new_object(&name("app/Model"));
    machine
        .invoke_static("lib/Mutator", "poison", "(Lapp/Model;)V", vec![target.clone()])
        .unwrap();
    assert_eq!(machine.field(&target, "name"), Value::Null);
    handler.take()
}

#[test]
fn boundary_writes_are_checked_in_global_mode() {
    let violations = poison(EnforcementMode::Global);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].violation.message, "Field 'name' must be NonNull");
    let location = violations[0].location.as_ref().unwrap();
    assert_eq!(location.class_name, "lib/Mutator");
    assert_eq!(location.line, Some(3));
}

#[test]
fn boundary_writes_are_not_checked_in_standard_mode() {
    assert!(poison(EnforcementMode::Standard).is_empty());
}

#[test]
fn unchecked_overrides_are_checked_in_global_mode() {
    let mut contract = class("app/Contract", "java/lang/Object");
    contract.add_method(method(
        "label",
        "()Ljava/lang/String;",
        MethodAccessFlags::PUBLIC,
        1,
        vec![
            insn(Instruction::Ldc(Constant::String(String::from("contract")))),
            branch(BranchInstruction::AReturn),
        ],
    ));
    let mut implementation = class("lib/Impl", "app/Contract");
    implementation.add_method(method(
        "label",
        "()Ljava/lang/String;",
        MethodAccessFlags::PUBLIC,
        1,
        vec![
            insn(Instruction::AConstNull),
            branch(BranchInstruction::AReturn),
        ],
    ));

    let mut settings = checking(&["app/Contract"]);
    settings.mode = EnforcementMode::Global;
    let implementation = weave(&settings, vec![contract.clone()], &implementation);

    let (handler, verifier) = recording();
    let mut machine = Machine::new(&verifier).with(contract).with(implementation);
    let receiver = machine.new_object(&name("lib/Impl"));
    machine
        .invoke_virtual("app/Contract", "label", "()Ljava/lang/String;", vec![receiver])
        .unwrap();

    let violations = handler.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].violation.message,
        "Return value of overridden method label must be NonNull"
    );
}

#[test]
fn weaving_is_deterministic() {
    let settings = checking(&["app/Sub"]);
    let sub = class("app/Sub", "lib/Base");
    assert_eq!(weave(&settings, vec![base()], &sub), weave(&settings, vec![base()], &sub));

    let settings = checking(&["app/Service"]);
    let once = weave(&settings, vec![], &service(vec![]));
    let twice = weave(&settings, vec![], &service(vec![]));
    assert_eq!(once, twice);
}
