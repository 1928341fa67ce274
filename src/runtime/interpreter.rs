use crate::language::ast::{Node, NodeKind, OpKind};
use crate::language::names::NameTable;
use crate::runtime::builtins;
use crate::runtime::dict::Dict;
use crate::runtime::error::{EvalResult, RuntimeError, RuntimeResult};
use crate::runtime::scopes::ScopeStack;
use crate::runtime::value::{Function, Heap, NativeFn, Num, ObjId, Value};
use std::rc::Rc;

/// Result of evaluating one form: either a value (possibly absent) or a
/// control-flow signal travelling up to the construct that consumes it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Eval {
    Value(Option<ObjId>),
    Continue,
    Break,
    Return(Option<ObjId>),
}

impl Eval {
    /// The carried value, if any. Signals evaluated in operand position
    /// collapse to their payload; `continue`/`break` carry none.
    pub fn value(&self) -> Option<ObjId> {
        match self {
            Eval::Value(v) | Eval::Return(v) => *v,
            Eval::Continue | Eval::Break => None,
        }
    }
}

/// Signal left over from a scoped body after its payload has been copied
/// out of the dying frame.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Signal {
    Normal,
    Continue,
    Break,
    Return,
}

pub struct Interpreter {
    heap: Heap,
    scopes: ScopeStack,
    names: NameTable,
}

impl Interpreter {
    /// Builds a runtime with the global frame in place and the stock
    /// natives installed. The global frame is never popped.
    pub fn new(names: NameTable) -> Self {
        let mut interp = Self {
            heap: Heap::new(),
            scopes: ScopeStack::new(),
            names,
        };
        interp
            .scopes
            .push(false, &mut interp.heap)
            .expect("empty frame push cannot fail");
        builtins::install(&mut interp);
        interp
    }

    /// Binds a host routine as a function value in the current frame.
    pub fn install_native(&mut self, name: &str, routine: NativeFn) {
        let id = self.heap.alloc(Value::Func(Function::Native(routine)), true);
        let name_id = self.names.intern(name);
        self.scopes.add(name_id, id);
    }

    /// Executes top-level forms in order, discarding their results.
    pub fn run(&mut self, program: &[Rc<Node>]) -> EvalResult<()> {
        for node in program {
            let result = self.execute(node)?;
            self.try_destroy(result.value());
        }
        Ok(())
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Resolves a spelled name through the current scope stack.
    pub fn lookup(&self, name: &str) -> Option<ObjId> {
        let id = self.names.lookup(name)?;
        self.scopes.find(id)
    }

    // -- native routine interface --

    pub fn native_arg(&self, pos: i64) -> RuntimeResult<ObjId> {
        self.scopes.arg(pos)
    }

    pub fn native_arg_count(&self) -> usize {
        self.scopes.arg_count()
    }

    /// Allocates a result object owned by the current frame.
    pub fn alloc_result(&mut self, value: Value) -> ObjId {
        let id = self.heap.alloc(value, false);
        self.scopes.track(id);
        id
    }

    // -- evaluation --

    pub fn execute(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        match &node.kind {
            NodeKind::Bool(b) => self.literal(Value::Bool(*b)),
            NodeKind::Char(c) => self.literal(Value::Char(*c)),
            NodeKind::Int(i) => self.literal(Value::Int(*i)),
            NodeKind::Real(r) => self.literal(Value::Real(*r)),
            NodeKind::Str(s) => self.literal(Value::Str(s.clone())),
            NodeKind::Null => self.literal(Value::Ptr(None)),
            NodeKind::Dict => self.literal(Value::Dict(Dict::new())),
            NodeKind::Name(name) => {
                let id = self.scopes.find(*name).ok_or_else(|| {
                    RuntimeError::NameResolution {
                        name: self.names.text(*name).to_string(),
                    }
                    .at(node.span)
                })?;
                Ok(Eval::Value(Some(id)))
            }
            NodeKind::Block => self.exec_block(node),
            NodeKind::Op(op) => match op {
                OpKind::Set => self.exec_set(node),
                OpKind::While => self.exec_while(node),
                OpKind::For => self.exec_for(node),
                OpKind::Repeat => self.exec_repeat(node),
                OpKind::If => self.exec_if(node),
                OpKind::Continue => {
                    Self::expect_kids(node, 0)?;
                    Ok(Eval::Continue)
                }
                OpKind::Break => {
                    Self::expect_kids(node, 0)?;
                    Ok(Eval::Break)
                }
                OpKind::Return => self.exec_return(node),
                OpKind::Func => self.exec_func(node),
                OpKind::Arg => self.exec_arg(node),
                OpKind::Call => self.exec_call(node),
                OpKind::BoolCast => self.exec_cast(node, Heap::cast_bool),
                OpKind::CharCast => self.exec_cast(node, Heap::cast_char),
                OpKind::IntCast => self.exec_cast(node, Heap::cast_int),
                OpKind::RealCast => self.exec_cast(node, Heap::cast_real),
                OpKind::StringCast => self.exec_cast(node, Heap::cast_string),
                OpKind::Deref => self.exec_deref(node),
                OpKind::Ref => self.exec_ref(node),
                OpKind::Inv | OpKind::Not | OpKind::Neg => self.exec_unary(node, *op),
                OpKind::Mult
                | OpKind::Div
                | OpKind::Rem
                | OpKind::Add
                | OpKind::Sub
                | OpKind::Shl
                | OpKind::Shr
                | OpKind::Lt
                | OpKind::Gt
                | OpKind::Le
                | OpKind::Ge
                | OpKind::Eq
                | OpKind::Neq
                | OpKind::And
                | OpKind::Xor
                | OpKind::Or
                | OpKind::Conj
                | OpKind::Disj => self.exec_binary(node, *op),
                OpKind::DictAccess
                | OpKind::DictSize
                | OpKind::DictPresent
                | OpKind::DictInsert
                | OpKind::DictRemove
                | OpKind::DictKeys
                | OpKind::DictValues
                | OpKind::DictClear => self.exec_dict(node, *op),
                OpKind::StrAccess
                | OpKind::StrSize
                | OpKind::StrAddSuffix
                | OpKind::StrAddPrefix
                | OpKind::StrRemoveSuffix
                | OpKind::StrRemovePrefix => self.exec_string(node, *op),
            },
        }
    }

    fn literal(&mut self, value: Value) -> EvalResult<Eval> {
        let id = self.heap.alloc(value, false);
        self.scopes.track(id);
        Ok(Eval::Value(Some(id)))
    }

    /// Destroys an object unless something still owns it by reference.
    /// Used on operands once a construct is done with them.
    fn try_destroy(&mut self, id: Option<ObjId>) {
        if let Some(id) = id {
            if self.heap.is_live(id) && !self.heap.is_referenceable(id) {
                self.scopes.untrack(id);
                self.heap.free(id);
            }
        }
    }

    /// Evaluates an operand position: control-flow signals collapse to
    /// their carried value.
    fn eval_operand(&mut self, node: &Rc<Node>) -> EvalResult<Option<ObjId>> {
        Ok(self.execute(node)?.value())
    }

    fn expect_value(&mut self, node: &Rc<Node>) -> EvalResult<ObjId> {
        self.eval_operand(node)?
            .ok_or_else(|| RuntimeError::MissingValue.at(node.span))
    }

    fn expect_kids(node: &Node, count: usize) -> EvalResult<()> {
        if node.kids.len() != count {
            let expected = match count {
                0 => "0",
                1 => "1",
                2 => "2",
                3 => "3",
                4 => "4",
                _ => "more",
            };
            return Err(RuntimeError::Arity {
                expected,
                found: node.kids.len(),
            }
            .at(node.span));
        }
        Ok(())
    }

    /// Runs a body in a fresh parent-accessing frame, copies its result
    /// out to the surviving frame, and reports which signal ended it.
    fn exec_scoped(&mut self, body: &Rc<Node>) -> EvalResult<(Signal, Option<ObjId>)> {
        self.scopes
            .push(true, &mut self.heap)
            .map_err(|e| e.at(body.span))?;
        let result = self.execute(body)?;
        let copied = self.copy_out(result.value(), body)?;
        self.scopes.pop(&mut self.heap);
        let signal = match result {
            Eval::Value(_) => Signal::Normal,
            Eval::Continue => Signal::Continue,
            Eval::Break => Signal::Break,
            Eval::Return(_) => Signal::Return,
        };
        Ok((signal, copied))
    }

    /// Copies a value produced in the top frame into the parent frame,
    /// which takes ownership of the (non-referenceable) copy.
    fn copy_out(&mut self, value: Option<ObjId>, node: &Node) -> EvalResult<Option<ObjId>> {
        match value {
            None => Ok(None),
            Some(id) => {
                let copy = self
                    .heap
                    .copy(id, false)
                    .map_err(|e| e.at(node.span))?;
                self.scopes.track_in_parent(copy);
                Ok(Some(copy))
            }
        }
    }

    fn expect_bool_cond(&mut self, node: &Rc<Node>) -> EvalResult<bool> {
        let id = self.expect_value(node)?;
        let flag = self.heap.expect_bool(id).map_err(|e| e.at(node.span))?;
        self.try_destroy(Some(id));
        Ok(flag)
    }

    // -- constructs --

    fn exec_block(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        self.scopes
            .push(true, &mut self.heap)
            .map_err(|e| e.at(node.span))?;
        let mut last = None;
        for kid in &node.kids {
            match self.execute(kid)? {
                Eval::Value(v) => last = v,
                Eval::Continue => {
                    self.scopes.pop(&mut self.heap);
                    return Ok(Eval::Continue);
                }
                Eval::Break => {
                    self.scopes.pop(&mut self.heap);
                    return Ok(Eval::Break);
                }
                Eval::Return(v) => {
                    let copied = self.copy_out(v, kid)?;
                    self.scopes.pop(&mut self.heap);
                    return Ok(Eval::Return(copied));
                }
            }
        }
        let copied = self.copy_out(last, node)?;
        self.scopes.pop(&mut self.heap);
        Ok(Eval::Value(copied))
    }

    fn exec_set(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 2)?;
        if let NodeKind::Name(name) = &node.kids[0].kind {
            let name = *name;
            let source = self.expect_value(&node.kids[1])?;
            match self.scopes.find(name) {
                // Rebind wherever the resolution walk found the name.
                Some(existing) => {
                    self.heap
                        .replace_with_copy(existing, source)
                        .map_err(|e| e.at(node.span))?;
                }
                None => {
                    let copy = self
                        .heap
                        .copy(source, true)
                        .map_err(|e| e.at(node.span))?;
                    self.scopes.add(name, copy);
                }
            }
            self.try_destroy(Some(source));
        } else {
            let target = self.expect_value(&node.kids[0])?;
            if !self.heap.is_referenceable(target) {
                return Err(RuntimeError::NotReferenceable.at(node.kids[0].span));
            }
            let source = self.expect_value(&node.kids[1])?;
            self.heap
                .replace_with_copy(target, source)
                .map_err(|e| e.at(node.span))?;
            self.try_destroy(Some(source));
        }
        Ok(Eval::Value(None))
    }

    fn exec_while(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 2)?;
        loop {
            if !self.expect_bool_cond(&node.kids[0])? {
                return Ok(Eval::Value(None));
            }
            let (signal, result) = self.exec_scoped(&node.kids[1])?;
            match signal {
                Signal::Break => {
                    self.try_destroy(result);
                    return Ok(Eval::Value(None));
                }
                Signal::Return => return Ok(Eval::Return(result)),
                Signal::Normal | Signal::Continue => self.try_destroy(result),
            }
        }
    }

    fn exec_for(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 4)?;
        let init = self.eval_operand(&node.kids[0])?;
        self.try_destroy(init);
        loop {
            if !self.expect_bool_cond(&node.kids[1])? {
                return Ok(Eval::Value(None));
            }
            let (signal, result) = self.exec_scoped(&node.kids[3])?;
            match signal {
                Signal::Break => {
                    self.try_destroy(result);
                    return Ok(Eval::Value(None));
                }
                Signal::Return => return Ok(Eval::Return(result)),
                Signal::Normal | Signal::Continue => self.try_destroy(result),
            }
            let step = self.eval_operand(&node.kids[2])?;
            self.try_destroy(step);
        }
    }

    fn exec_repeat(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 2)?;
        loop {
            let (signal, result) = self.exec_scoped(&node.kids[0])?;
            match signal {
                Signal::Break => {
                    self.try_destroy(result);
                    return Ok(Eval::Value(None));
                }
                Signal::Return => return Ok(Eval::Return(result)),
                Signal::Normal | Signal::Continue => self.try_destroy(result),
            }
            if self.expect_bool_cond(&node.kids[1])? {
                return Ok(Eval::Value(None));
            }
        }
    }

    fn exec_if(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 3)?;
        let branch = if self.expect_bool_cond(&node.kids[0])? {
            &node.kids[1]
        } else {
            &node.kids[2]
        };
        let (signal, result) = self.exec_scoped(branch)?;
        match signal {
            Signal::Continue => {
                self.try_destroy(result);
                Ok(Eval::Continue)
            }
            Signal::Break => {
                self.try_destroy(result);
                Ok(Eval::Break)
            }
            Signal::Return => Ok(Eval::Return(result)),
            // A branch's value is not the if's value.
            Signal::Normal => {
                self.try_destroy(result);
                Ok(Eval::Value(None))
            }
        }
    }

    fn exec_return(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        match node.kids.len() {
            0 => Ok(Eval::Return(None)),
            1 => {
                let value = self.eval_operand(&node.kids[0])?;
                Ok(Eval::Return(value))
            }
            found => Err(RuntimeError::Arity {
                expected: "at most 1",
                found,
            }
            .at(node.span)),
        }
    }

    fn exec_func(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let id = self
            .heap
            .alloc(Value::Func(Function::Script(node.kids[0].clone())), false);
        self.scopes.track(id);
        Ok(Eval::Value(Some(id)))
    }

    fn exec_arg(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let index = self.expect_value(&node.kids[0])?;
        let pos = self
            .heap
            .expect_int(index)
            .map_err(|e| e.at(node.kids[0].span))?;
        let arg = self.scopes.arg(pos).map_err(|e| e.at(node.span))?;
        self.try_destroy(Some(index));
        Ok(Eval::Value(Some(arg)))
    }

    fn exec_call(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        if node.kids.is_empty() {
            return Err(RuntimeError::Arity {
                expected: "at least 1",
                found: 0,
            }
            .at(node.span));
        }
        let callee = self.expect_value(&node.kids[0])?;
        let function = match self.heap.value(callee) {
            Some(Value::Func(f)) => f.clone(),
            Some(other) => {
                return Err(RuntimeError::Type {
                    expected: "function",
                    found: other.kind(),
                }
                .at(node.kids[0].span));
            }
            None => return Err(RuntimeError::DanglingPointer.at(node.kids[0].span)),
        };

        let mut args = Vec::with_capacity(node.kids.len() - 1);
        for kid in &node.kids[1..] {
            args.push(self.expect_value(kid)?);
        }
        // Pushed in reverse so that position 0 reads the first written
        // argument.
        args.reverse();

        self.scopes
            .push(false, &mut self.heap)
            .map_err(|e| e.at(node.span))?;
        for arg in &args {
            let copy = self
                .heap
                .copy(*arg, true)
                .map_err(|e| e.at(node.span))?;
            self.scopes.push_arg(copy);
        }
        let returned = match function {
            Function::Script(body) => self.execute(&body)?.value(),
            Function::Native(routine) => routine(self).map_err(|e| e.at(node.span))?,
        };
        let result = self.copy_out(returned, node)?;
        self.scopes.pop(&mut self.heap);

        for arg in args {
            self.try_destroy(Some(arg));
        }
        self.try_destroy(Some(callee));
        Ok(Eval::Value(result))
    }

    fn exec_cast(
        &mut self,
        node: &Rc<Node>,
        cast: fn(&mut Heap, ObjId) -> RuntimeResult<ObjId>,
    ) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let arg = self.expect_value(&node.kids[0])?;
        let result = cast(&mut self.heap, arg).map_err(|e| e.at(node.span))?;
        self.scopes.track(result);
        self.try_destroy(Some(arg));
        Ok(Eval::Value(Some(result)))
    }

    fn exec_deref(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let ptr = self.expect_value(&node.kids[0])?;
        let target = self.heap.deref(ptr).map_err(|e| e.at(node.span))?;
        self.try_destroy(Some(ptr));
        Ok(Eval::Value(Some(target)))
    }

    fn exec_ref(&mut self, node: &Rc<Node>) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let target = self.expect_value(&node.kids[0])?;
        // The operand is deliberately kept alive: the pointer aliases it.
        let id = self.heap.alloc(Value::Ptr(Some(target)), false);
        self.scopes.track(id);
        Ok(Eval::Value(Some(id)))
    }

    fn exec_unary(&mut self, node: &Rc<Node>, op: OpKind) -> EvalResult<Eval> {
        Self::expect_kids(node, 1)?;
        let arg = self.expect_value(&node.kids[0])?;
        let result = self.apply_unary(op, arg).map_err(|e| e.at(node.span))?;
        self.scopes.track(result);
        self.try_destroy(Some(arg));
        Ok(Eval::Value(Some(result)))
    }

    fn exec_binary(&mut self, node: &Rc<Node>, op: OpKind) -> EvalResult<Eval> {
        Self::expect_kids(node, 2)?;
        let lhs = self.expect_value(&node.kids[0])?;
        let rhs = self.expect_value(&node.kids[1])?;
        let result = self
            .apply_binary(op, lhs, rhs)
            .map_err(|e| e.at(node.span))?;
        self.scopes.track(result);
        self.try_destroy(Some(lhs));
        self.try_destroy(Some(rhs));
        Ok(Eval::Value(Some(result)))
    }

    fn apply_unary(&mut self, op: OpKind, arg: ObjId) -> RuntimeResult<ObjId> {
        let value = match op {
            OpKind::Inv => Value::Int(!self.heap.expect_int(arg)?),
            OpKind::Not => Value::Bool(!self.heap.expect_bool(arg)?),
            OpKind::Neg => match self.heap.number(arg)? {
                Num::Int(v) => Value::Int(v.wrapping_neg()),
                Num::Real(v) => Value::Real(-v),
            },
            _ => unreachable!("not a unary operation"),
        };
        Ok(self.heap.alloc(value, false))
    }

    fn apply_binary(&mut self, op: OpKind, lhs: ObjId, rhs: ObjId) -> RuntimeResult<ObjId> {
        use OpKind::*;
        match op {
            Add | Sub | Mult | Div | Rem => self.numeric(op, lhs, rhs),
            Shl | Shr | And | Xor | Or => self.bitwise(op, lhs, rhs),
            Lt => self.compare(lhs, rhs, false),
            Le => self.compare(lhs, rhs, true),
            Gt => self.compare(rhs, lhs, false),
            Ge => self.compare(rhs, lhs, true),
            Eq => {
                let equal = self.heap.equal(lhs, rhs)?;
                Ok(self.heap.alloc(Value::Bool(equal), false))
            }
            Neq => {
                let equal = self.heap.equal(lhs, rhs)?;
                Ok(self.heap.alloc(Value::Bool(!equal), false))
            }
            Conj | Disj => self.boolean(op, lhs, rhs),
            _ => unreachable!("not a binary operation"),
        }
    }

    /// Arithmetic with int/real promotion: two ints stay exact, any real
    /// operand promotes both to real.
    fn numeric(&mut self, op: OpKind, lhs: ObjId, rhs: ObjId) -> RuntimeResult<ObjId> {
        let x = self.heap.number(lhs)?;
        let y = self.heap.number(rhs)?;
        let value = match (x, y) {
            (Num::Int(x), Num::Int(y)) => Value::Int(match op {
                OpKind::Add => x.wrapping_add(y),
                OpKind::Sub => x.wrapping_sub(y),
                OpKind::Mult => x.wrapping_mul(y),
                OpKind::Div => {
                    if y == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    x.wrapping_div(y)
                }
                OpKind::Rem => {
                    if y == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    x.wrapping_rem(y)
                }
                _ => unreachable!(),
            }),
            (x, y) => {
                let (x, y) = (x.as_real(), y.as_real());
                Value::Real(match op {
                    OpKind::Add => x + y,
                    OpKind::Sub => x - y,
                    OpKind::Mult => x * y,
                    OpKind::Div => x / y,
                    OpKind::Rem => ieee_remainder(x, y),
                    _ => unreachable!(),
                })
            }
        };
        Ok(self.heap.alloc(value, false))
    }

    fn bitwise(&mut self, op: OpKind, lhs: ObjId, rhs: ObjId) -> RuntimeResult<ObjId> {
        let x = self.heap.expect_int(lhs)?;
        let y = self.heap.expect_int(rhs)?;
        let value = match op {
            OpKind::Shl => x.wrapping_shl(y as u32),
            OpKind::Shr => x.wrapping_shr(y as u32),
            OpKind::And => x & y,
            OpKind::Xor => x ^ y,
            OpKind::Or => x | y,
            _ => unreachable!(),
        };
        Ok(self.heap.alloc(Value::Int(value), false))
    }

    fn compare(&mut self, lhs: ObjId, rhs: ObjId, or_equal: bool) -> RuntimeResult<ObjId> {
        let x = self.heap.number(lhs)?;
        let y = self.heap.number(rhs)?;
        let result = match (x, y) {
            (Num::Int(x), Num::Int(y)) => {
                if or_equal {
                    x <= y
                } else {
                    x < y
                }
            }
            (x, y) => {
                let (x, y) = (x.as_real(), y.as_real());
                if or_equal {
                    x <= y
                } else {
                    x < y
                }
            }
        };
        Ok(self.heap.alloc(Value::Bool(result), false))
    }

    /// Both operands are evaluated before the operation, so there is no
    /// short-circuiting.
    fn boolean(&mut self, op: OpKind, lhs: ObjId, rhs: ObjId) -> RuntimeResult<ObjId> {
        let x = self.heap.expect_bool(lhs)?;
        let y = self.heap.expect_bool(rhs)?;
        let value = match op {
            OpKind::Conj => x && y,
            OpKind::Disj => x || y,
            _ => unreachable!(),
        };
        Ok(self.heap.alloc(Value::Bool(value), false))
    }

    fn exec_dict(&mut self, node: &Rc<Node>, op: OpKind) -> EvalResult<Eval> {
        let operands = match op {
            OpKind::DictInsert => 3,
            OpKind::DictAccess | OpKind::DictPresent | OpKind::DictRemove => 2,
            _ => 1,
        };
        Self::expect_kids(node, operands)?;
        let dict = self.expect_value(&node.kids[0])?;
        if !matches!(self.heap.value(dict), Some(Value::Dict(_))) {
            let found = self.heap.value(dict).map_or("nothing", Value::kind);
            return Err(RuntimeError::Type {
                expected: "dict",
                found,
            }
            .at(node.kids[0].span));
        }
        let fatal = |e: RuntimeError| e.at(node.span);
        match op {
            OpKind::DictAccess => {
                let key = self.expect_value(&node.kids[1])?;
                let result = self.heap.dict_access(dict, key).map_err(fatal)?;
                self.try_destroy(Some(key));
                self.try_destroy(Some(dict));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::DictSize => {
                let size = self.heap.dict_size(dict).map_err(fatal)?;
                let result = self.heap.alloc(Value::Int(size), false);
                self.scopes.track(result);
                self.try_destroy(Some(dict));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::DictPresent => {
                let key = self.expect_value(&node.kids[1])?;
                let present = self.heap.dict_present(dict, key).map_err(fatal)?;
                let result = self.heap.alloc(Value::Bool(present), false);
                self.scopes.track(result);
                self.try_destroy(Some(key));
                self.try_destroy(Some(dict));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::DictInsert => {
                let key = self.expect_value(&node.kids[1])?;
                let val = self.expect_value(&node.kids[2])?;
                self.heap.dict_insert(dict, key, val).map_err(fatal)?;
                self.try_destroy(Some(key));
                self.try_destroy(Some(val));
                self.try_destroy(Some(dict));
                Ok(Eval::Value(None))
            }
            OpKind::DictRemove => {
                let key = self.expect_value(&node.kids[1])?;
                self.heap.dict_remove(dict, key).map_err(fatal)?;
                self.try_destroy(Some(key));
                self.try_destroy(Some(dict));
                Ok(Eval::Value(None))
            }
            OpKind::DictKeys => {
                let result = self.heap.dict_keys(dict).map_err(fatal)?;
                self.scopes.track(result);
                self.try_destroy(Some(dict));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::DictValues => {
                let result = self.heap.dict_values(dict).map_err(fatal)?;
                self.scopes.track(result);
                self.try_destroy(Some(dict));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::DictClear => {
                self.heap.dict_clear(dict).map_err(fatal)?;
                self.try_destroy(Some(dict));
                Ok(Eval::Value(None))
            }
            _ => unreachable!("not a dict operation"),
        }
    }

    fn exec_string(&mut self, node: &Rc<Node>, op: OpKind) -> EvalResult<Eval> {
        let operands = match op {
            OpKind::StrSize => 1,
            _ => 2,
        };
        Self::expect_kids(node, operands)?;
        let string = self.expect_value(&node.kids[0])?;
        if !matches!(self.heap.value(string), Some(Value::Str(_))) {
            let found = self.heap.value(string).map_or("nothing", Value::kind);
            return Err(RuntimeError::Type {
                expected: "string",
                found,
            }
            .at(node.kids[0].span));
        }
        let fatal = |e: RuntimeError| e.at(node.span);
        match op {
            OpKind::StrAccess => {
                let index = self.expect_value(&node.kids[1])?;
                let result = self.heap.string_access(string, index).map_err(fatal)?;
                self.scopes.track(result);
                self.try_destroy(Some(index));
                self.try_destroy(Some(string));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::StrSize => {
                let result = self.heap.string_size(string).map_err(fatal)?;
                self.scopes.track(result);
                self.try_destroy(Some(string));
                Ok(Eval::Value(Some(result)))
            }
            OpKind::StrAddSuffix => {
                let arg = self.expect_value(&node.kids[1])?;
                self.heap.string_add_suffix(string, arg).map_err(fatal)?;
                self.try_destroy(Some(arg));
                self.try_destroy(Some(string));
                Ok(Eval::Value(None))
            }
            OpKind::StrAddPrefix => {
                let arg = self.expect_value(&node.kids[1])?;
                self.heap.string_add_prefix(string, arg).map_err(fatal)?;
                self.try_destroy(Some(arg));
                self.try_destroy(Some(string));
                Ok(Eval::Value(None))
            }
            OpKind::StrRemoveSuffix => {
                let arg = self.expect_value(&node.kids[1])?;
                self.heap.string_remove_suffix(string, arg).map_err(fatal)?;
                self.try_destroy(Some(arg));
                self.try_destroy(Some(string));
                Ok(Eval::Value(None))
            }
            OpKind::StrRemovePrefix => {
                let arg = self.expect_value(&node.kids[1])?;
                self.heap.string_remove_prefix(string, arg).map_err(fatal)?;
                self.try_destroy(Some(arg));
                self.try_destroy(Some(string));
                Ok(Eval::Value(None))
            }
            _ => unreachable!("not a string operation"),
        }
    }
}

/// IEEE 754 remainder (round-half-to-even quotient), used for `rem` as
/// soon as either operand is real.
fn ieee_remainder(x: f64, y: f64) -> f64 {
    let quotient = (x / y).round_ties_even();
    x - y * quotient
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::lexer::lex;
    use crate::language::parser::parse_program;

    fn run(source: &str) -> Interpreter {
        let tokens = lex(source).expect("lex");
        let mut names = NameTable::new();
        let program = parse_program(&tokens, &mut names).expect("parse");
        let mut interp = Interpreter::new(names);
        interp.run(&program).expect("run");
        interp
    }

    fn int_of(interp: &Interpreter, name: &str) -> i64 {
        let id = interp.lookup(name).expect("name is bound");
        interp.heap().expect_int(id).expect("int value")
    }

    #[test]
    fn operand_position_swallows_signals() {
        // The stray `return` contributes its value and the signal stops
        // at the operand boundary.
        let interp = run("(set x (return 5))");
        assert_eq!(int_of(&interp, "x"), 5);
    }

    #[test]
    fn bindings_are_copies() {
        let interp = run("(set a 1) (set b a) (set a 2)");
        assert_eq!(int_of(&interp, "a"), 2);
        assert_eq!(int_of(&interp, "b"), 1);
    }

    #[test]
    fn arity_is_checked() {
        let tokens = lex("(add 1)").expect("lex");
        let mut names = NameTable::new();
        let program = parse_program(&tokens, &mut names).expect("parse");
        let mut interp = Interpreter::new(names);
        let err = interp.run(&program).expect_err("should fail");
        assert_eq!(
            err.error,
            RuntimeError::Arity {
                expected: "2",
                found: 1
            }
        );
    }

    #[test]
    fn ieee_remainder_rounds_to_even() {
        assert_eq!(ieee_remainder(5.0, 2.0), 1.0);
        assert_eq!(ieee_remainder(7.0, 2.0), -1.0);
        assert_eq!(ieee_remainder(-5.5, 3.0), 0.5);
    }

    #[test]
    fn temporaries_do_not_accumulate() {
        let interp = run("(set x 0) (while (lt x 100) ((set x (add x 1))))");
        assert_eq!(int_of(&interp, "x"), 100);
        // x, the stock natives, and nothing else.
        assert!(interp.heap().live_count() < 32);
    }
}
