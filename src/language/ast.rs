use crate::language::names::NameId;
use crate::language::span::Span;
use std::rc::Rc;

/// Operation heads recognized in the first position of a bracketed form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Set,
    While,
    For,
    Repeat,
    If,
    Continue,
    Break,
    Return,
    Func,
    Arg,
    Call,
    BoolCast,
    CharCast,
    IntCast,
    RealCast,
    StringCast,
    Deref,
    Ref,
    Inv,
    Not,
    Neg,
    Mult,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Neq,
    And,
    Xor,
    Or,
    Conj,
    Disj,
    DictAccess,
    DictSize,
    DictPresent,
    DictInsert,
    DictRemove,
    DictKeys,
    DictValues,
    DictClear,
    StrAccess,
    StrSize,
    StrAddSuffix,
    StrAddPrefix,
    StrRemoveSuffix,
    StrRemovePrefix,
}

impl OpKind {
    pub fn from_keyword(word: &str) -> Option<OpKind> {
        use OpKind::*;
        Some(match word {
            "set" => Set,
            "while" => While,
            "for" => For,
            "repeat" => Repeat,
            "if" => If,
            "continue" => Continue,
            "break" => Break,
            "return" => Return,
            "func" => Func,
            "arg" => Arg,
            "call" => Call,
            "bool" => BoolCast,
            "char" => CharCast,
            "int" => IntCast,
            "real" => RealCast,
            "string" => StringCast,
            "deref" => Deref,
            "ref" => Ref,
            "inv" => Inv,
            "not" => Not,
            "neg" => Neg,
            "mult" => Mult,
            "div" => Div,
            "rem" => Rem,
            "add" => Add,
            "sub" => Sub,
            "shl" => Shl,
            "shr" => Shr,
            "lt" => Lt,
            "gt" => Gt,
            "le" => Le,
            "ge" => Ge,
            "eq" => Eq,
            "neq" => Neq,
            "and" => And,
            "xor" => Xor,
            "or" => Or,
            "conj" => Conj,
            "disj" => Disj,
            "[d]" => DictAccess,
            "[dn]" => DictSize,
            "[d?]" => DictPresent,
            "[d+]" => DictInsert,
            "[d-]" => DictRemove,
            "[dk]" => DictKeys,
            "[dv]" => DictValues,
            "[dc]" => DictClear,
            "[s]" => StrAccess,
            "[sn]" => StrSize,
            "[s+]" => StrAddSuffix,
            "[+s]" => StrAddPrefix,
            "[s-]" => StrRemoveSuffix,
            "[-s]" => StrRemovePrefix,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        use OpKind::*;
        match self {
            Set => "set",
            While => "while",
            For => "for",
            Repeat => "repeat",
            If => "if",
            Continue => "continue",
            Break => "break",
            Return => "return",
            Func => "func",
            Arg => "arg",
            Call => "call",
            BoolCast => "bool",
            CharCast => "char",
            IntCast => "int",
            RealCast => "real",
            StringCast => "string",
            Deref => "deref",
            Ref => "ref",
            Inv => "inv",
            Not => "not",
            Neg => "neg",
            Mult => "mult",
            Div => "div",
            Rem => "rem",
            Add => "add",
            Sub => "sub",
            Shl => "shl",
            Shr => "shr",
            Lt => "lt",
            Gt => "gt",
            Le => "le",
            Ge => "ge",
            Eq => "eq",
            Neq => "neq",
            And => "and",
            Xor => "xor",
            Or => "or",
            Conj => "conj",
            Disj => "disj",
            DictAccess => "[d]",
            DictSize => "[dn]",
            DictPresent => "[d?]",
            DictInsert => "[d+]",
            DictRemove => "[d-]",
            DictKeys => "[dk]",
            DictValues => "[dv]",
            DictClear => "[dc]",
            StrAccess => "[s]",
            StrSize => "[sn]",
            StrAddSuffix => "[s+]",
            StrAddPrefix => "[+s]",
            StrRemoveSuffix => "[s-]",
            StrRemovePrefix => "[-s]",
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Op(OpKind),
    Block,
    Name(NameId),
    Bool(bool),
    Char(char),
    Int(i64),
    Real(f64),
    Str(String),
    Null,
    Dict,
}

/// A parsed form. Bodies of `func` forms are shared by reference, which is
/// what gives function values their identity semantics.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub kids: Vec<Rc<Node>>,
}

impl Node {
    pub fn leaf(kind: NodeKind, span: Span) -> Rc<Node> {
        Rc::new(Node {
            kind,
            span,
            kids: Vec::new(),
        })
    }
}
