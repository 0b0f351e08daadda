use gradejar::header::MemberKey;
use gradejar::jvm::class_file::Version;
use gradejar::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, Instruction, InvokeType, SymbolicInstruction,
};
use gradejar::jvm::model::{Class, Field, Method};
use gradejar::jvm::references::{ConstantData, FieldRef, MethodRef};
use gradejar::jvm::{
    self, BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, RefType, UnqualifiedName,
};
use gradejar::transform::{Error, ModuleTransformer, Settings};

fn binary(name: &str) -> BinaryName {
    BinaryName::from_string(name.to_owned()).unwrap()
}

fn unqualified(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_string(name.to_owned()).unwrap()
}

fn descriptor(desc: &str) -> MethodDescriptor<BinaryName> {
    MethodDescriptor::parse(desc).unwrap()
}

fn method(
    class: &BinaryName,
    access_flags: MethodAccessFlags,
    name: &str,
    desc: &str,
    body: impl FnOnce(&mut CodeBuilder) -> Result<(), jvm::Error>,
) -> Method {
    let mut method = Method::new(access_flags, unqualified(name), descriptor(desc));
    let code = {
        let context = method.code_context(class, Version::JAVA8);
        let mut builder = CodeBuilder::new(&context);
        body(&mut builder).unwrap();
        builder.result().unwrap()
    };
    method.code = Some(code);
    method
}

fn default_constructor(class: &BinaryName) -> Method {
    method(class, MethodAccessFlags::PUBLIC, "<init>", "()V", |code| {
        code.push_instruction(Instruction::ALoad(0))?;
        code.invoke(
            InvokeType::Special,
            MethodRef::new(BinaryName::OBJECT, UnqualifiedName::INIT, descriptor("()V")),
        )?;
        code.push_branch_instruction(BranchInstruction::Return)
    })
}

fn add_two_ints(code: &mut CodeBuilder) -> Result<(), jvm::Error> {
    code.push_instruction(Instruction::ILoad(1))?;
    code.push_instruction(Instruction::ILoad(2))?;
    code.push_instruction(Instruction::IAdd)?;
    code.push_branch_instruction(BranchInstruction::IReturn)
}

fn store_count(class: &BinaryName, value: SymbolicInstruction) -> Method {
    let owner = class.clone();
    method(class, MethodAccessFlags::STATIC, "<clinit>", "()V", move |code| {
        code.push_instruction(value)?;
        code.push_instruction(Instruction::PutStatic(FieldRef {
            class: owner,
            name: unqualified("count"),
            descriptor: FieldType::int(),
        }))?;
        code.push_branch_instruction(BranchInstruction::Return)
    })
}

/// A learner's calculator, with a couple of typos and one wrong return type
fn submission() -> Class {
    let name = binary("h00/Calculater");
    let mut class = Class::new(
        Version::JAVA8,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        name.clone(),
        Some(BinaryName::OBJECT),
    );
    class.fields.push(Field::new(
        FieldAccessFlags::PRIVATE,
        unqualified("memroy"),
        FieldType::int(),
    ));
    class.fields.push(Field::new(
        FieldAccessFlags::STATIC,
        unqualified("count"),
        FieldType::int(),
    ));

    class.methods.push(default_constructor(&name));
    class.methods.push(method(&name, MethodAccessFlags::PUBLIC, "ad", "(II)I", add_two_ints));
    class.methods.push(method(&name, MethodAccessFlags::PUBLIC, "total", "()J", |code| {
        code.push_instruction(Instruction::LConst1)?;
        code.push_branch_instruction(BranchInstruction::LReturn)
    }));
    class.methods.push(store_count(&name, Instruction::IConst3));
    class
}

fn solution() -> Class {
    let name = binary("h00/Calculator");
    let mut class = Class::new(
        Version::JAVA8,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        name.clone(),
        Some(BinaryName::OBJECT),
    );
    class.fields.push(Field::new(
        FieldAccessFlags::PRIVATE,
        unqualified("memory"),
        FieldType::int(),
    ));
    class.fields.push(Field::new(
        FieldAccessFlags::STATIC,
        unqualified("count"),
        FieldType::int(),
    ));
    class.fields.push(Field::new(
        FieldAccessFlags::PRIVATE,
        unqualified("history"),
        FieldType::array(FieldType::int()),
    ));

    class.methods.push(default_constructor(&name));
    class.methods.push(method(&name, MethodAccessFlags::PUBLIC, "add", "(II)I", add_two_ints));
    class.methods.push(method(&name, MethodAccessFlags::PUBLIC, "total", "()I", |code| {
        code.push_instruction(Instruction::IConst0)?;
        code.push_branch_instruction(BranchInstruction::IReturn)
    }));
    let lambda_owner = name.clone();
    class.methods.push(method(&name, MethodAccessFlags::PUBLIC, "reset", "()V", move |code| {
        code.push_instruction(Instruction::IConst1)?;
        code.invoke(
            InvokeType::Static,
            MethodRef::new(lambda_owner, unqualified("lambda$add$0"), descriptor("(I)I")),
        )?;
        code.push_instruction(Instruction::Pop)?;
        code.push_branch_instruction(BranchInstruction::Return)
    }));
    class.methods.push(method(
        &name,
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
        "lambda$add$0",
        "(I)I",
        |code| {
            code.push_instruction(Instruction::ILoad(0))?;
            code.push_branch_instruction(BranchInstruction::IReturn)
        },
    ));
    class.methods.push(store_count(&name, Instruction::IConst5));
    class
}

/// Run the transformer and parse every class it produces back from bytes
fn rewrite(
    settings: Settings,
    submission: Vec<Class>,
    solution: Vec<Class>,
) -> Result<Vec<Class>, Error> {
    let mut transformer = ModuleTransformer::new(settings);
    for class in submission {
        transformer.add_submission_class(&class.to_bytes()?)?;
    }
    for class in solution {
        transformer.add_solution_class(&class.to_bytes()?)?;
    }

    let mut classes = vec![];
    for (name, class_file) in transformer.transform()? {
        let class = Class::parse_class(&class_file)?;
        assert_eq!(class.name, name);
        classes.push(Class::from_bytes(&class.to_bytes()?)?);
    }
    Ok(classes)
}

fn rewrite_pair() -> Class {
    let mut classes = rewrite(Settings::new().unwrap(), vec![submission()], vec![solution()])
        .unwrap();
    assert_eq!(classes.len(), 1);
    classes.remove(0)
}

fn find<'a>(class: &'a Class, name: &str, desc: &str) -> &'a Method {
    class
        .find_method(&unqualified(name), &descriptor(desc))
        .unwrap_or_else(|| panic!("missing method {}{}", name, desc))
}

fn instructions(method: &Method) -> Vec<&SymbolicInstruction> {
    method.code.as_ref().unwrap().instructions().collect()
}

fn invoked(method: &Method) -> Vec<String> {
    instructions(method)
        .into_iter()
        .filter_map(|insn| match insn {
            Instruction::Invoke(_, method) => Some(method.name.as_str().to_owned()),
            _ => None,
        })
        .collect()
}

fn strings(method: &Method) -> Vec<String> {
    instructions(method)
        .into_iter()
        .filter_map(|insn| match insn {
            Instruction::Ldc(ConstantData::String(string)) => Some(string.clone()),
            _ => None,
        })
        .collect()
}

fn count(method: &Method, wanted: &SymbolicInstruction) -> usize {
    instructions(method)
        .into_iter()
        .filter(|insn| *insn == wanted)
        .count()
}

fn creates(method: &Method, class: &BinaryName) -> bool {
    instructions(method).into_iter().any(|insn| {
        matches!(insn, Instruction::New(RefType::Object(created)) if created == class)
    })
}

#[test]
fn paired_class_takes_reference_names() {
    let class = rewrite_pair();
    assert_eq!(class.name, binary("h00/Calculator"));

    let fields: Vec<&str> = class.fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(fields, vec!["memory", "count", "history"]);

    for (name, desc) in [
        ("<init>", "()V"),
        ("add", "(II)I"),
        ("total", "()I"),
        ("reset", "()V"),
        ("<clinit>", "()V"),
    ] {
        find(&class, name, desc);
    }
    assert!(class.find_method(&unqualified("ad"), &descriptor("(II)I")).is_none());
}

#[test]
fn calls_go_through_the_execution_handler() {
    let class = rewrite_pair();
    let add = find(&class, "add", "(II)I");

    let calls = invoked(add);
    for expected in [
        "getInstance",
        "logInvocation",
        "addInvocation",
        "useSubstitution",
        "useReferenceImpl",
        "getSubstitution",
        "execute",
    ] {
        assert!(calls.iter().any(|call| call == expected), "no call to {}", expected);
    }

    // Once for the submission body and once for the replayed reference body
    assert_eq!(count(add, &Instruction::IAdd), 2);
}

#[test]
fn mismatched_method_throws_and_keeps_its_body() {
    let class = rewrite_pair();

    let total = find(&class, "total", "()I");
    assert!(creates(total, &BinaryName::NOSUCHMETHODERROR));
    assert!(strings(total)
        .iter()
        .any(|message| message.contains("does not match the expected")));
    assert_eq!(count(total, &Instruction::LConst1), 0);

    let passthrough = find(&class, "total", "()J");
    assert_eq!(count(passthrough, &Instruction::LConst1), 1);
    assert!(invoked(passthrough).is_empty());
}

#[test]
fn reference_only_methods_are_synthesized() {
    let class = rewrite_pair();

    let reset = find(&class, "reset", "()V");
    assert!(creates(reset, &BinaryName::NOSUCHMETHODERROR));
    assert!(strings(reset)
        .iter()
        .any(|message| message.starts_with("Submission does not implement")));

    let calls = invoked(reset);
    assert!(calls.iter().any(|call| call == "lambda$add$0$solution"));
    assert!(!calls.iter().any(|call| call == "lambda$add$0"));
    find(&class, "lambda$add$0$solution", "(I)I");
}

#[test]
fn static_initializer_mirrors_submission_stores() {
    let class = rewrite_pair();
    let clinit = find(&class, "<clinit>", "()V");

    let stores = instructions(clinit)
        .into_iter()
        .filter(|insn| matches!(insn, Instruction::PutStatic(_)))
        .count();
    assert_eq!(stores, 1);
    assert!(invoked(clinit)
        .iter()
        .any(|call| call == "recordStaticFieldValue"));
    assert!(strings(clinit).contains(&String::from("count")));

    // The reference value for `count` is computed, then dropped
    let code = instructions(clinit);
    assert!(code
        .windows(2)
        .any(|pair| *pair[0] == Instruction::IConst5 && *pair[1] == Instruction::Pop));
}

#[test]
fn constructors_route_through_known_candidates() {
    let class = rewrite_pair();
    let init = find(&class, "<init>", "()V");

    assert!(invoked(init)
        .iter()
        .any(|call| call == "getConstructorInvocation"));
    let strings = strings(init);
    assert!(strings.contains(&String::from("java/lang/Object")));
    assert!(strings.contains(&String::from("()V")));
    assert!(creates(init, &BinaryName::ILLEGALARGUMENTEXCEPTION));
}

#[test]
fn unpaired_classes_keep_their_names() {
    let classes = rewrite(Settings::new().unwrap(), vec![submission()], vec![]).unwrap();
    assert_eq!(classes.len(), 1);
    let class = &classes[0];
    assert_eq!(class.name, binary("h00/Calculater"));

    let ad = find(class, "ad", "(II)I");
    assert_eq!(count(ad, &Instruction::IAdd), 1);
    let calls = invoked(ad);
    assert!(calls.iter().any(|call| call == "logInvocation"));
    assert!(!calls.iter().any(|call| call == "useReferenceImpl"));
}

#[test]
fn replaced_calls_become_static_calls() {
    let mut settings = Settings::new().unwrap();
    let replacement = MethodRef::new(
        binary("grading/Replacements"),
        unqualified("max"),
        descriptor("(II)I"),
    );
    settings.add_replacement(
        MemberKey {
            owner: binary("java/lang/Math"),
            name: unqualified("max"),
            descriptor: String::from("(II)I"),
        },
        replacement.clone(),
    );

    let mut class = submission();
    let owner = class.name.clone();
    class.methods.push(method(&owner, MethodAccessFlags::PUBLIC, "biggest", "(II)I", |code| {
        code.push_instruction(Instruction::ILoad(1))?;
        code.push_instruction(Instruction::ILoad(2))?;
        code.invoke_static(binary("java/lang/Math"), unqualified("max"), descriptor("(II)I"))?;
        code.push_branch_instruction(BranchInstruction::IReturn)
    }));

    let classes = rewrite(settings, vec![class], vec![solution()]).unwrap();
    let biggest = find(&classes[0], "biggest", "(II)I");
    assert_eq!(
        count(biggest, &Instruction::Invoke(InvokeType::Static, replacement)),
        1
    );
    assert!(!instructions(biggest).into_iter().any(|insn| matches!(
        insn,
        Instruction::Invoke(_, method) if method.class == RefType::Object(binary("java/lang/Math"))
    )));
}

#[test]
fn missing_type_mapping_aborts() {
    let mut class = submission();
    class.fields.push(Field::new(
        FieldAccessFlags::PRIVATE,
        unqualified("ghost"),
        FieldType::object(binary("h00/Ghost")),
    ));

    match rewrite(Settings::new().unwrap(), vec![class], vec![solution()]) {
        Err(Error::MissingTypeMapping(missing)) => assert_eq!(missing, binary("h00/Ghost")),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("rewriting should have failed"),
    }
}

#[test]
fn out_of_range_threshold_aborts() {
    let mut settings = Settings::new().unwrap();
    settings.similarity_threshold = f64::NAN;
    match rewrite(settings, vec![submission()], vec![solution()]) {
        Err(Error::InvalidThreshold(threshold)) => assert!(threshold.is_nan()),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("rewriting should have failed"),
    }
}

#[test]
fn rewritten_classes_are_written_under_their_package() {
    let mut transformer = ModuleTransformer::new(Settings::new().unwrap());
    transformer
        .add_submission_class(&submission().to_bytes().unwrap())
        .unwrap();
    transformer
        .add_solution_class(&solution().to_bytes().unwrap())
        .unwrap();

    let output = tempfile::tempdir().unwrap();
    for (name, class_file) in transformer.transform().unwrap() {
        class_file
            .save_to_path(output.path().join(format!("{}.class", name)), true)
            .unwrap();
    }

    let path = output.path().join("h00").join("Calculator.class");
    let class = Class::from_bytes(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(class.name, binary("h00/Calculator"));
}
