//! Binary and unary algebra (pp1, pp2, pp4, pp9, pp13, pp40, pp41): element-wise operators
//! between two matching-shape results, or between one result and a scalar.

use crate::error::{CassError, CassResult};
use crate::event::CassEvent;
use crate::processor::{Compute, ProcessContext};
use crate::result::ResultContainer;

/// The closed operator set named in §4.H: `{+, -, *, /, AND, OR, <, <=, >, >=, ==, !=, NOT}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Not,
}

impl Op {
    pub fn parse(s: &str) -> CassResult<Self> {
        Ok(match s {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "and" | "AND" => Op::And,
            "or" | "OR" => Op::Or,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "==" => Op::Eq,
            "!=" => Op::Ne,
            "not" | "NOT" => Op::Not,
            other => {
                return Err(CassError::BadConfig {
                    processor: "Algebra".into(),
                    reason: format!("unknown operator '{other}'"),
                })
            }
        })
    }

    fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            Op::Add => a + b,
            Op::Sub => a - b,
            Op::Mul => a * b,
            Op::Div => a / b,
            Op::And => ((a != 0.0) && (b != 0.0)) as i32 as f32,
            Op::Or => ((a != 0.0) || (b != 0.0)) as i32 as f32,
            Op::Lt => (a < b) as i32 as f32,
            Op::Le => (a <= b) as i32 as f32,
            Op::Gt => (a > b) as i32 as f32,
            Op::Ge => (a >= b) as i32 as f32,
            Op::Eq => (a == b) as i32 as f32,
            Op::Ne => (a != b) as i32 as f32,
            Op::Not => (a == 0.0) as i32 as f32,
        }
    }
}

/// Right-hand operand: another processor's result, or a fixed scalar.
#[derive(Debug, Clone)]
pub enum Operand {
    Processor(String),
    Constant(f32),
}

/// Element-wise algebra between `input_a` and `operand_b`, or the unary `Not` of
/// `input_a` alone. `swap` reverses operand order for non-commutative operators.
pub struct Algebra {
    pub input_a: String,
    pub op: Op,
    pub operand_b: Option<Operand>,
    pub swap: bool,
    pub shape_hint: ResultContainer,
}

impl Algebra {
    pub fn binary(input_a: impl Into<String>, op: Op, operand_b: Operand, shape_hint: ResultContainer) -> Self {
        Self {
            input_a: input_a.into(),
            op,
            operand_b: Some(operand_b),
            swap: false,
            shape_hint,
        }
    }

    pub fn unary_not(input_a: impl Into<String>, shape_hint: ResultContainer) -> Self {
        Self {
            input_a: input_a.into(),
            op: Op::Not,
            operand_b: None,
            swap: false,
            shape_hint,
        }
    }
}

impl Compute for Algebra {
    fn process(&self, event: &CassEvent, out: &mut ResultContainer, ctx: &ProcessContext) -> CassResult<()> {
        let a_handle = ctx.dependency(&self.input_a, event.id)?;
        let a = a_handle.read();

        match &self.operand_b {
            None => {
                let n = a.datasize().min(out.datasize());
                for i in 0..n {
                    out.storage[i] = self.op.apply(a.storage[i], 0.0);
                }
            }
            Some(Operand::Constant(c)) => {
                let n = a.datasize().min(out.datasize());
                for i in 0..n {
                    let (lhs, rhs) = if self.swap { (*c, a.storage[i]) } else { (a.storage[i], *c) };
                    out.storage[i] = self.op.apply(lhs, rhs);
                }
            }
            Some(Operand::Processor(name)) => {
                let b_handle = ctx.dependency(name, event.id)?;
                let b = b_handle.read();
                if a.datasize() == b.datasize() {
                    let n = a.datasize().min(out.datasize());
                    for i in 0..n {
                        let (lhs, rhs) = if self.swap {
                            (b.storage[i], a.storage[i])
                        } else {
                            (a.storage[i], b.storage[i])
                        };
                        out.storage[i] = self.op.apply(lhs, rhs);
                    }
                } else if b.datasize() == 1 {
                    let scalar = b.get_value();
                    let n = a.datasize().min(out.datasize());
                    for i in 0..n {
                        let (lhs, rhs) = if self.swap { (scalar, a.storage[i]) } else { (a.storage[i], scalar) };
                        out.storage[i] = self.op.apply(lhs, rhs);
                    }
                } else {
                    return Err(CassError::ShapeMismatch {
                        reason: format!(
                            "operand shapes {} vs {} do not match and neither is scalar",
                            a.datasize(),
                            b.datasize()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn result_template(&self) -> ResultContainer {
        self.shape_hint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cached_list::ResultHandle;
    use crate::event::EventId;
    use crate::processor::DependencyResolver;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(HashMap<String, ResultHandle>);
    impl DependencyResolver for MapResolver {
        fn result_of(&self, name: &str, _id: EventId) -> CassResult<ResultHandle> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| CassError::UnknownProcessor { name: name.into() })
        }
    }

    #[test]
    fn s1_algebra_addition() {
        let mut a = ResultContainer::array_1d("A", 3);
        a.storage.copy_from_slice(&[1.0, 2.0, 3.0]);
        let mut b = ResultContainer::array_1d("B", 3);
        b.storage.copy_from_slice(&[4.0, 5.0, 6.0]);

        let mut map = HashMap::new();
        map.insert("A".to_string(), Arc::new(RwLock::new(a)) as ResultHandle);
        map.insert("B".to_string(), Arc::new(RwLock::new(b)) as ResultHandle);
        let resolver = MapResolver(map);
        let ctx = ProcessContext { resolver: &resolver };

        let algebra = Algebra::binary("A", Op::Add, Operand::Processor("B".into()), ResultContainer::array_1d("pp1", 3));
        let mut out = algebra.result_template();
        let mut evt = CassEvent::new();
        evt.id = 1;
        algebra.process(&evt, &mut out, &ctx).unwrap();
        assert_eq!(out.storage, vec![5.0, 7.0, 9.0]);
    }
}
