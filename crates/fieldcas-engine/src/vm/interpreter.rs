//! Interpreter for emitted method bodies
//!
//! Executes the instruction subset that synthesized accessors and rewritten
//! call sites use. Calls through the constant pool are not executed; the
//! accessor operations are entered directly with
//! [`Interpreter::invoke_accessor`].

use std::sync::atomic::{fence, Ordering};

use super::heap::Heap;
use super::value::{ObjRef, Value};
use super::{VmError, VmResult};
use crate::compiler::bytecode::{Instruction, Opcode, Operand};
use crate::compiler::codegen::MethodBody;
use crate::compiler::intrinsic::atomic_field::{AccessorOp, AccessorRegistry};
use crate::compiler::types::{ClassId, FieldRef};

/// Operand stack entry
#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    Value(Value),
    /// Address of an instance slot, produced by `LoadFieldAddress`
    Address { obj: ObjRef, slot: u16 },
    /// Constant pool entry pushed by `Ldc`; only ever discarded
    Constant,
}

/// Result of executing a single instruction
enum Step {
    Continue,
    Jump(u32),
    Return(Option<Value>),
}

/// Interpreter bound to a heap and an accessor registry
pub struct Interpreter<'a> {
    heap: &'a Heap,
    registry: &'a AccessorRegistry,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter
    ///
    /// Fails if the registry was created for another class table than the
    /// heap's, since accessor classes are looked up by id.
    pub fn new(heap: &'a Heap, registry: &'a AccessorRegistry) -> VmResult<Self> {
        if !registry.is_bound_to(heap.classes()) {
            return Err(VmError::ForeignRegistry);
        }
        Ok(Self { heap, registry })
    }

    /// Execute a method body with the given arguments (receiver first)
    pub fn execute(&self, body: &MethodBody, args: &[Value]) -> VmResult<Option<Value>> {
        let mut locals = args.to_vec();
        let mut stack: Vec<Entry> = Vec::with_capacity(usize::from(body.max_stack));
        let mut pc = 0usize;

        while let Some(instr) = body.code.get(pc) {
            pc += 1;
            match self.step(instr, &mut stack, &mut locals)? {
                Step::Continue => {}
                Step::Jump(target) => pc = target as usize,
                Step::Return(value) => return Ok(value),
            }
        }
        Err(VmError::FellOffEnd(body.name.clone()))
    }

    /// Allocate an object and run its accessor constructor if it has one
    pub fn new_object(&self, class: ClassId) -> VmResult<ObjRef> {
        let obj = self.heap.alloc(class)?;
        if let Some(accessor) = self.registry.by_class(class) {
            self.execute(accessor.constructor(), &[Value::Ref(obj)])?;
        }
        Ok(obj)
    }

    /// Run an accessor operation on an accessor instance
    ///
    /// `args` excludes the accessor itself.
    pub fn invoke_accessor(&self, accessor_obj: ObjRef, op: AccessorOp, args: &[Value]) -> VmResult<Option<Value>> {
        let class = self.heap.class_of(accessor_obj)?;
        let accessor = self
            .registry
            .by_class(class)
            .ok_or(VmError::NotAnAccessor(accessor_obj))?;

        let expected = op.arg_count() - 1;
        if args.len() != expected {
            return Err(VmError::ArgCount {
                op: op.name(),
                expected,
                found: args.len(),
            });
        }

        let mut full = Vec::with_capacity(op.arg_count());
        full.push(Value::Ref(accessor_obj));
        full.extend_from_slice(args);
        self.execute(accessor.method(op), &full)
    }

    /// `compareAndSet(target, expected, update)`
    pub fn compare_and_set(&self, accessor_obj: ObjRef, target: Value, expected: Value, update: Value) -> VmResult<bool> {
        let result = self.invoke_accessor(accessor_obj, AccessorOp::CompareAndSet, &[target, expected, update])?;
        result
            .and_then(Value::as_bool)
            .ok_or(VmError::TypeMismatch {
                opcode: Opcode::ReturnValue,
                expected: "boolean",
            })
    }

    /// `get(target)`
    pub fn get(&self, accessor_obj: ObjRef, target: Value) -> VmResult<Value> {
        let result = self.invoke_accessor(accessor_obj, AccessorOp::Get, &[target])?;
        result.ok_or(VmError::TypeMismatch {
            opcode: Opcode::Return,
            expected: "value",
        })
    }

    /// `set(target, value)`
    pub fn set(&self, accessor_obj: ObjRef, target: Value, value: Value) -> VmResult<()> {
        self.invoke_accessor(accessor_obj, AccessorOp::Set, &[target, value])?;
        Ok(())
    }

    fn step(&self, instr: &Instruction, stack: &mut Vec<Entry>, locals: &mut Vec<Value>) -> VmResult<Step> {
        let op = instr.opcode;
        match op {
            Opcode::Nop => {}
            Opcode::Pop => {
                pop(stack, op)?;
            }
            Opcode::Dup => {
                let top = pop(stack, op)?;
                stack.push(top);
                stack.push(top);
            }
            Opcode::AconstNull => stack.push(Entry::Value(Value::Null)),
            Opcode::Ldc => {
                instr.pool_index().ok_or(VmError::MalformedOperand(op))?;
                stack.push(Entry::Constant);
            }
            Opcode::Iconst => match instr.operand {
                Operand::Int(i) => stack.push(Entry::Value(Value::Int(i))),
                _ => return Err(VmError::MalformedOperand(op)),
            },
            Opcode::LoadArg | Opcode::Aload => {
                let index = local_index(instr)?;
                let value = locals
                    .get(usize::from(index))
                    .copied()
                    .ok_or(VmError::LocalOutOfRange(index))?;
                stack.push(Entry::Value(value));
            }
            Opcode::Astore => {
                let index = usize::from(local_index(instr)?);
                let value = pop_value(stack, op)?;
                if index >= locals.len() {
                    locals.resize(index + 1, Value::Null);
                }
                locals[index] = value;
            }
            Opcode::CastClass => {
                let target = class_operand(instr)?;
                let top = stack.last().copied().ok_or(VmError::StackUnderflow(op))?;
                self.check_cast(top, target, op)?;
            }
            Opcode::GetField | Opcode::VolatileLoadField => {
                let field = field_operand(instr)?;
                let obj = pop_obj(stack, op)?;
                let order = if op == Opcode::VolatileLoadField {
                    Ordering::Acquire
                } else {
                    Ordering::Relaxed
                };
                stack.push(Entry::Value(self.heap.load(obj, field.slot(), order)?));
            }
            Opcode::PutField | Opcode::VolatileStoreField => {
                let field = field_operand(instr)?;
                let value = pop_value(stack, op)?;
                let obj = pop_obj(stack, op)?;
                let order = if op == Opcode::VolatileStoreField {
                    Ordering::Release
                } else {
                    Ordering::Relaxed
                };
                self.heap.store(obj, field.slot(), value, order)?;
            }
            Opcode::LoadFieldAddress => {
                let field = field_operand(instr)?;
                let obj = pop_obj(stack, op)?;
                stack.push(Entry::Address { obj, slot: field.slot() });
            }
            Opcode::CompareExchange => {
                let expected = pop_value(stack, op)?;
                let update = pop_value(stack, op)?;
                let (obj, slot) = match pop(stack, op)? {
                    Entry::Address { obj, slot } => (obj, slot),
                    _ => {
                        return Err(VmError::TypeMismatch {
                            opcode: op,
                            expected: "field address",
                        })
                    }
                };
                let previous = self.heap.compare_exchange(obj, slot, expected, update)?;
                stack.push(Entry::Value(previous));
            }
            Opcode::MemoryBarrier => fence(Ordering::SeqCst),
            Opcode::Ceq => {
                let b = pop_value(stack, op)?;
                let a = pop_value(stack, op)?;
                stack.push(Entry::Value(Value::Bool(a == b)));
            }
            Opcode::NewObject => {
                let class = class_operand(instr)?;
                let obj = self.new_object(class)?;
                stack.push(Entry::Value(Value::Ref(obj)));
            }
            Opcode::CallBaseConstructor => {
                // The intrinsic base type has an empty constructor
                pop_obj(stack, op)?;
            }
            Opcode::Goto => return Ok(Step::Jump(target_operand(instr)?)),
            Opcode::IfNull | Opcode::IfNonNull => {
                let target = target_operand(instr)?;
                let is_null = pop_value(stack, op)?.is_null();
                if is_null == (op == Opcode::IfNull) {
                    return Ok(Step::Jump(target));
                }
            }
            Opcode::Return => return Ok(Step::Return(None)),
            Opcode::ReturnValue => return Ok(Step::Return(Some(pop_value(stack, op)?))),
            Opcode::New
            | Opcode::InvokeStatic
            | Opcode::InvokeVirtual
            | Opcode::InvokeSpecial
            | Opcode::Throw => return Err(VmError::Unsupported(op)),
        }
        Ok(Step::Continue)
    }

    fn check_cast(&self, entry: Entry, target: ClassId, op: Opcode) -> VmResult<()> {
        let classes = self.heap.classes();
        let class_name = |id: ClassId| {
            classes
                .name(id)
                .map_or_else(|| id.to_string(), |name| name.to_string())
        };

        match entry {
            Entry::Value(Value::Null) => Ok(()),
            Entry::Value(Value::Ref(obj)) => {
                let class = self.heap.class_of(obj)?;
                if classes.is_assignable(class, target) {
                    Ok(())
                } else {
                    Err(VmError::ClassCast {
                        expected: class_name(target),
                        found: class_name(class),
                    })
                }
            }
            Entry::Value(other) => Err(VmError::ClassCast {
                expected: class_name(target),
                found: other.kind_name().to_string(),
            }),
            _ => Err(VmError::TypeMismatch {
                opcode: op,
                expected: "value",
            }),
        }
    }
}

fn pop(stack: &mut Vec<Entry>, op: Opcode) -> VmResult<Entry> {
    stack.pop().ok_or(VmError::StackUnderflow(op))
}

fn pop_value(stack: &mut Vec<Entry>, op: Opcode) -> VmResult<Value> {
    match pop(stack, op)? {
        Entry::Value(value) => Ok(value),
        _ => Err(VmError::TypeMismatch {
            opcode: op,
            expected: "value",
        }),
    }
}

fn pop_obj(stack: &mut Vec<Entry>, op: Opcode) -> VmResult<ObjRef> {
    match pop_value(stack, op)? {
        Value::Ref(obj) => Ok(obj),
        Value::Null => Err(VmError::NullReference(op)),
        _ => Err(VmError::TypeMismatch {
            opcode: op,
            expected: "reference",
        }),
    }
}

fn local_index(instr: &Instruction) -> VmResult<u16> {
    match instr.operand {
        Operand::Local(index) => Ok(index),
        _ => Err(VmError::MalformedOperand(instr.opcode)),
    }
}

fn class_operand(instr: &Instruction) -> VmResult<ClassId> {
    match instr.operand {
        Operand::Class(class) => Ok(class),
        _ => Err(VmError::MalformedOperand(instr.opcode)),
    }
}

fn target_operand(instr: &Instruction) -> VmResult<u32> {
    instr.target().ok_or(VmError::MalformedOperand(instr.opcode))
}

fn field_operand(instr: &Instruction) -> VmResult<&FieldRef> {
    match &instr.operand {
        Operand::Field(field) if !field.is_static() => Ok(field),
        Operand::Field(_) => Err(VmError::Unsupported(instr.opcode)),
        _ => Err(VmError::MalformedOperand(instr.opcode)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::compiler::finish::FinishQueue;
    use crate::compiler::intrinsic::atomic_field::test_support::Fixture;
    use crate::compiler::intrinsic::atomic_field::{AccessorType, AtomicFieldIntrinsic};
    use crate::config::IntrinsicConfig;

    struct Runtime {
        fx: Fixture,
        registry: AccessorRegistry,
        heap: Heap,
        accessor: Arc<AccessorType>,
    }

    /// Fixture with a finished accessor for `demo/Node.next`
    fn runtime() -> Runtime {
        let fx = Fixture::new();
        let registry = AccessorRegistry::new(fx.classes.clone());
        let finish = FinishQueue::new();
        let config = IntrinsicConfig::default();
        let accessor = AtomicFieldIntrinsic::new(&registry, &finish, &config)
            .synthesize(&fx.next_field())
            .unwrap();
        finish.run_all().unwrap();
        let heap = Heap::new(fx.classes.clone());
        Runtime {
            fx,
            registry,
            heap,
            accessor,
        }
    }

    #[test]
    fn test_compare_and_set_semantics() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();
        let node = Value::Ref(vm.new_object(rt.fx.node).unwrap());
        let a = Value::Ref(vm.new_object(rt.fx.item).unwrap());
        let b = Value::Ref(vm.new_object(rt.fx.item).unwrap());

        assert!(vm.compare_and_set(updater, node, Value::Null, a).unwrap());
        assert_eq!(vm.get(updater, node).unwrap(), a);

        // Stale expectation fails and leaves the field alone
        assert!(!vm.compare_and_set(updater, node, Value::Null, b).unwrap());
        assert_eq!(vm.get(updater, node).unwrap(), a);

        assert!(vm.compare_and_set(updater, node, a, b).unwrap());
        assert_eq!(vm.get(updater, node).unwrap(), b);

        vm.set(updater, node, Value::Null).unwrap();
        assert_eq!(vm.get(updater, node).unwrap(), Value::Null);
    }

    #[test]
    fn test_target_of_wrong_class() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();
        let item = Value::Ref(vm.new_object(rt.fx.item).unwrap());

        let err = vm.get(updater, item).unwrap_err();
        assert_eq!(
            err,
            VmError::ClassCast {
                expected: "demo/Node".to_string(),
                found: "demo/Item".to_string(),
            }
        );
    }

    #[test]
    fn test_update_of_wrong_class() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();
        let node = Value::Ref(vm.new_object(rt.fx.node).unwrap());

        let err = vm.set(updater, node, node).unwrap_err();
        assert!(matches!(err, VmError::ClassCast { .. }));
        let err = vm
            .compare_and_set(updater, node, Value::Null, Value::Int(3))
            .unwrap_err();
        assert!(matches!(err, VmError::ClassCast { ref found, .. } if found == "int"));
    }

    #[test]
    fn test_null_target() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();

        assert_eq!(
            vm.get(updater, Value::Null),
            Err(VmError::NullReference(Opcode::VolatileLoadField))
        );
        assert_eq!(
            vm.compare_and_set(updater, Value::Null, Value::Null, Value::Null),
            Err(VmError::NullReference(Opcode::LoadFieldAddress))
        );
    }

    #[test]
    fn test_arg_count_checked() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();

        let err = vm
            .invoke_accessor(updater, AccessorOp::Get, &[Value::Null, Value::Null])
            .unwrap_err();
        assert_eq!(
            err,
            VmError::ArgCount {
                op: "get",
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_not_an_accessor() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let node = vm.new_object(rt.fx.node).unwrap();
        assert_eq!(
            vm.get(node, Value::Ref(node)),
            Err(VmError::NotAnAccessor(node))
        );
    }

    #[test]
    fn test_accessor_not_instantiable_before_finish() {
        let fx = Fixture::new();
        let registry = AccessorRegistry::new(fx.classes.clone());
        let finish = FinishQueue::new();
        let config = IntrinsicConfig::default();
        let accessor = AtomicFieldIntrinsic::new(&registry, &finish, &config)
            .synthesize(&fx.next_field())
            .unwrap();

        let heap = Heap::new(fx.classes.clone());
        let vm = Interpreter::new(&heap, &registry).unwrap();
        assert!(matches!(
            vm.new_object(accessor.class()),
            Err(VmError::TypeNotFinalized(_))
        ));

        finish.run_all().unwrap();
        assert!(vm.new_object(accessor.class()).is_ok());
    }

    #[test]
    fn test_concurrent_compare_and_set_has_one_winner() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();
        let node = Value::Ref(vm.new_object(rt.fx.node).unwrap());
        let candidates: Vec<Value> = (0..16)
            .map(|_| Value::Ref(vm.new_object(rt.fx.item).unwrap()))
            .collect();

        let winners: Vec<Value> = std::thread::scope(|s| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|&candidate| {
                    let vm = &vm;
                    s.spawn(move || {
                        let won = vm
                            .compare_and_set(updater, node, Value::Null, candidate)
                            .unwrap();
                        won.then_some(candidate)
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .collect()
        });

        assert_eq!(winners.len(), 1);
        assert_eq!(vm.get(updater, node).unwrap(), winners[0]);
    }

    #[test]
    fn test_set_publishes_earlier_plain_writes() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let updater = vm.new_object(rt.accessor.class()).unwrap();
        let plain = rt.fx.classes.get_field(rt.fx.node, "plain", "Ldemo/Item;").unwrap();

        for _round in 0..64 {
            let node = vm.new_object(rt.fx.node).unwrap();
            let payload = Value::Ref(vm.new_object(rt.fx.item).unwrap());
            let flag = Value::Ref(vm.new_object(rt.fx.item).unwrap());

            let seen = std::thread::scope(|s| {
                let vm = &vm;
                let heap = &rt.heap;
                let plain = &plain;
                let reader = s.spawn(move || {
                    // Spin until the accessor store is visible, then read the
                    // plain slot without any ordering of its own
                    while vm.get(updater, Value::Ref(node)).unwrap() != flag {
                        std::hint::spin_loop();
                    }
                    heap.load(node, plain.slot(), Ordering::Relaxed).unwrap()
                });
                s.spawn(move || {
                    heap.store(node, plain.slot(), payload, Ordering::Relaxed).unwrap();
                    vm.set(updater, Value::Ref(node), flag).unwrap();
                });
                reader.join().unwrap()
            });
            assert_eq!(seen, payload);
        }
    }

    #[test]
    fn test_unsupported_opcode() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        let body = MethodBody {
            name: "m".to_string(),
            descriptor: "()V".to_string(),
            code: vec![Instruction::simple(Opcode::Throw)],
            handlers: Vec::new(),
            max_stack: 0,
        };
        assert_eq!(vm.execute(&body, &[]), Err(VmError::Unsupported(Opcode::Throw)));
    }

    #[test]
    fn test_branches() {
        let rt = runtime();
        let vm = Interpreter::new(&rt.heap, &rt.registry).unwrap();
        // return arg0 == null ? 1 : 2
        let body = MethodBody {
            name: "m".to_string(),
            descriptor: "(Ljava/lang/Object;)I".to_string(),
            code: vec![
                Instruction::local(Opcode::LoadArg, 0),
                Instruction::jump(Opcode::IfNonNull, 4),
                Instruction::new(Opcode::Iconst, Operand::Int(1)),
                Instruction::simple(Opcode::ReturnValue),
                Instruction::new(Opcode::Iconst, Operand::Int(2)),
                Instruction::simple(Opcode::ReturnValue),
            ],
            handlers: Vec::new(),
            max_stack: 1,
        };
        let node = Value::Ref(vm.new_object(rt.fx.node).unwrap());
        assert_eq!(vm.execute(&body, &[Value::Null]).unwrap(), Some(Value::Int(1)));
        assert_eq!(vm.execute(&body, &[node]).unwrap(), Some(Value::Int(2)));
    }
}
