//! Loop assembly: closure checks and seam detection.
//!
//! A [`LoopBuilder`] takes the edge uses of one `EDGE_LOOP` in file order.
//! It moves from empty to accumulating on the first use, checks every join
//! as uses arrive, and on [`LoopBuilder::close`] checks the wrap-around join
//! and classifies repeated edges.

use std::collections::HashMap;

use crate::entities::{Entity, EdgeUse};
use crate::error::{Result, StepError};
use crate::registry::{EntityId, Registry};

/// Whether two vertex handles denote the same kernel vertex: the same
/// instance, or two vertices over the same point instance.
pub fn same_vertex(reg: &Registry<'_>, a: EntityId, b: EntityId) -> bool {
    if a == b {
        return true;
    }
    let point = |v| reg.get(v).ok().and_then(Entity::as_vertex).map(|v| v.point);
    matches!((point(a), point(b)), (Some(p), Some(q)) if p == q)
}

fn describe(reg: &Registry<'_>, key: EntityId) -> String {
    match reg.file_id(key) {
        Some(id) => format!("#{id}"),
        None => "<inline>".into(),
    }
}

/// A loop whose joins all check out.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoop {
    /// Uses in traversal order.
    pub uses: Vec<EdgeUse>,
    /// Edges used exactly twice, each listed once in order of first use.
    pub seams: Vec<EntityId>,
}

#[derive(Debug)]
enum LoopState {
    Empty,
    Accumulating(Vec<EdgeUse>),
    Closed(ClosedLoop),
}

/// Incremental builder for one loop.
pub struct LoopBuilder<'r, 'f> {
    reg: &'r Registry<'f>,
    id: u64,
    state: LoopState,
}

impl<'r, 'f> LoopBuilder<'r, 'f> {
    /// Builder for the loop with file id `id`.
    pub fn new(reg: &'r Registry<'f>, id: u64) -> Self {
        Self {
            reg,
            id,
            state: LoopState::Empty,
        }
    }

    fn describe(&self, key: EntityId) -> String {
        describe(self.reg, key)
    }

    /// Append the next use; it must start where the previous one ended.
    pub fn push(&mut self, next: EdgeUse) -> Result<()> {
        let (reg, id) = (self.reg, self.id);
        match &mut self.state {
            LoopState::Empty => {
                self.state = LoopState::Accumulating(vec![next]);
                Ok(())
            }
            LoopState::Accumulating(uses) => {
                let prev = uses[uses.len() - 1];
                if !same_vertex(reg, prev.end, next.start) {
                    return Err(StepError::topology(
                        id,
                        format!(
                            "edge {} ends at vertex {} but edge {} starts at vertex {}",
                            describe(reg, prev.oriented),
                            describe(reg, prev.end),
                            describe(reg, next.oriented),
                            describe(reg, next.start),
                        ),
                    ));
                }
                uses.push(next);
                Ok(())
            }
            LoopState::Closed(_) => Err(StepError::topology(id, "edge added to a closed loop")),
        }
    }

    /// Check the wrap-around join and find seams.
    pub fn close(&mut self) -> Result<()> {
        let uses = match std::mem::replace(&mut self.state, LoopState::Empty) {
            LoopState::Accumulating(uses) => uses,
            LoopState::Empty => return Err(StepError::topology(self.id, "loop has no edges")),
            closed @ LoopState::Closed(_) => {
                self.state = closed;
                return Ok(());
            }
        };
        let (first, last) = (uses[0], uses[uses.len() - 1]);
        if !same_vertex(self.reg, last.end, first.start) {
            return Err(StepError::topology(
                self.id,
                format!(
                    "loop does not close: last edge ends at vertex {}, first starts at vertex {}",
                    self.describe(last.end),
                    self.describe(first.start),
                ),
            ));
        }
        let seams = self.seams(&uses)?;
        self.state = LoopState::Closed(ClosedLoop { uses, seams });
        Ok(())
    }

    fn seams(&self, uses: &[EdgeUse]) -> Result<Vec<EntityId>> {
        let mut order = Vec::new();
        let mut seen: HashMap<EntityId, Vec<bool>> = HashMap::new();
        for u in uses {
            let senses = seen.entry(u.edge).or_default();
            if senses.is_empty() {
                order.push(u.edge);
            }
            senses.push(u.sense);
        }

        let mut seams = Vec::new();
        for edge in order {
            match seen[&edge].as_slice() {
                [_] => {}
                [a, b] if a != b => seams.push(edge),
                [_, _] => {
                    return Err(StepError::topology(
                        self.id,
                        format!("seam edge {} is used twice in the same direction", self.describe(edge)),
                    ))
                }
                more => {
                    return Err(StepError::topology(
                        self.id,
                        format!("edge {} is used {} times in one loop", self.describe(edge), more.len()),
                    ))
                }
            }
        }
        Ok(seams)
    }

    /// The finished loop.
    pub fn finish(self) -> Result<ClosedLoop> {
        match self.state {
            LoopState::Closed(closed) => Ok(closed),
            _ => Err(StepError::topology(self.id, "loop was not closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_util::{parse, SQUARE};
    use crate::error::ErrorKind;
    use crate::options::ReaderOptions;

    fn edge_use(reg: &mut Registry<'_>, id: u64) -> EdgeUse {
        let (key, oe) = reg
            .resolve_as(id, "ORIENTED_EDGE", Entity::as_oriented_edge)
            .unwrap();
        EdgeUse {
            oriented: key,
            edge: oe.edge_curve,
            sense: oe.sense,
            start: oe.start,
            end: oe.end,
        }
    }

    #[test]
    fn test_same_vertex() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let v5 = reg.resolve(5).unwrap();
        let v6 = reg.resolve(6).unwrap();
        let v46 = reg.resolve(46).unwrap();
        assert!(same_vertex(&reg, v6, v6));
        assert!(same_vertex(&reg, v6, v46));
        assert!(!same_vertex(&reg, v5, v6));
    }

    #[test]
    fn test_builder_states() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let uses: Vec<EdgeUse> = [21, 22, 23, 24].iter().map(|&id| edge_use(&mut reg, id)).collect();

        let mut empty = LoopBuilder::new(&reg, 99);
        assert_eq!(empty.close().unwrap_err().kind(), ErrorKind::TopologyMismatch);

        let mut builder = LoopBuilder::new(&reg, 99);
        for u in &uses {
            builder.push(*u).unwrap();
        }
        builder.close().unwrap();
        // Closing again keeps the loop.
        builder.close().unwrap();
        let err = builder.push(uses[0]).unwrap_err();
        assert_eq!(err.instance_id(), Some(99));

        let closed = builder.finish().unwrap();
        assert_eq!(closed.uses, uses);
        assert!(closed.seams.is_empty());
    }

    #[test]
    fn test_broken_join_names_the_edges() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let first = edge_use(&mut reg, 21);
        let third = edge_use(&mut reg, 23);

        let mut builder = LoopBuilder::new(&reg, 99);
        builder.push(first).unwrap();
        let err = builder.push(third).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        let message = err.to_string();
        assert!(message.contains("#21"), "{message}");
        assert!(message.contains("#23"), "{message}");
    }

    #[test]
    fn test_unclosed_builder_does_not_finish() {
        let file = parse(SQUARE);
        let options = ReaderOptions::default();
        let mut reg = Registry::new(&file, &options);
        let first = edge_use(&mut reg, 21);
        let mut builder = LoopBuilder::new(&reg, 99);
        builder.push(first).unwrap();
        assert!(builder.finish().is_err());
    }
}
