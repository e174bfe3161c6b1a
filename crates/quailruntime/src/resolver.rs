use crate::registry::NodeRegistry;
use quailcore::{NodeDescriptor, ResolveError};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path
    Visiting,
    /// Emitted into the order
    Done,
}

/// Expands requested ids into a linear execution order.
///
/// Depth-first, post-order: every dependency is emitted before its dependant
/// and each id exactly once. Targets are visited in request order and each
/// node's dependencies in `requires` order.
pub struct DependencyResolver<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>, ResolveError> {
        let mut marks: HashMap<&'a str, Mark> = HashMap::new();
        let mut path: Vec<&'a str> = Vec::new();
        let mut order = Vec::new();

        for target in targets {
            let target = target.as_ref();
            let descriptor = self
                .registry
                .get(target)
                .ok_or_else(|| ResolveError::UnknownTarget(target.to_string()))?;
            self.visit(descriptor, &mut marks, &mut path, &mut order)?;
        }

        tracing::debug!(targets = targets.len(), "Resolved execution order: {:?}", order);
        Ok(order)
    }

    /// Post-order walk from `root` driven by an explicit stack of
    /// `(descriptor, next dependency index)` frames
    fn visit(
        &self,
        root: &'a NodeDescriptor,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        if marks.get(root.id()) == Some(&Mark::Done) {
            return Ok(());
        }

        let mut stack: Vec<(&'a NodeDescriptor, usize)> = vec![(root, 0)];
        marks.insert(root.id(), Mark::Visiting);
        path.push(root.id());

        while let Some(frame) = stack.last_mut() {
            let descriptor = frame.0;
            let next = frame.1;
            frame.1 += 1;

            let Some(dep) = descriptor.requires().get(next) else {
                stack.pop();
                path.pop();
                marks.insert(descriptor.id(), Mark::Done);
                order.push(descriptor.id().to_string());
                continue;
            };

            let Some(dep_descriptor) = self.registry.get(dep) else {
                return Err(ResolveError::UnknownDependency {
                    node: descriptor.id().to_string(),
                    missing: dep.clone(),
                });
            };

            let dep_id = dep_descriptor.id();
            match marks.get(dep_id) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => return Err(cycle_error(path, dep_id)),
                None => {
                    marks.insert(dep_id, Mark::Visiting);
                    path.push(dep_id);
                    stack.push((dep_descriptor, 0));
                }
            }
        }
        Ok(())
    }
}

/// Cycle from the first occurrence of `reentered` on the path back to itself
fn cycle_error(path: &[&str], reentered: &str) -> ResolveError {
    let start = path.iter().position(|p| *p == reentered).unwrap_or(0);
    let mut cycle: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
    cycle.push(reentered.to_string());
    ResolveError::CyclicDependency { path: cycle }
}
