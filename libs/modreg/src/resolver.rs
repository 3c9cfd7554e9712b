//! Dependency resolution: depth-first topological ordering with three-coloring.
//!
//! Roots are visited in the order they are yielded, siblings in declaration order,
//! so a fixed registration sequence always yields the same order.

use std::collections::HashMap;

use crate::error::RegistryError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,  // visiting (on current path)
    Black, // visited (finished)
}

/// One module on the current path with the index of its next unvisited dependency.
struct Frame<'g> {
    name: &'g str,
    deps: &'g [String],
    next: usize,
}

struct Walk<'g, F> {
    deps_of: F,
    colors: HashMap<&'g str, Color>,
    stack: Vec<Frame<'g>>,
    order: Vec<String>,
}

impl<'g, F> Walk<'g, F>
where
    F: Fn(&str) -> Option<&'g [String]>,
{
    fn enter(&mut self, name: &'g str) {
        self.colors.insert(name, Color::Gray);
        self.stack.push(Frame {
            name,
            deps: (self.deps_of)(name).unwrap_or(&[]),
            next: 0,
        });
    }

    /// Back edge to `name`: report the loop from its first occurrence on the path.
    fn cycle(&self, name: &'g str) -> RegistryError {
        let start = self
            .stack
            .iter()
            .position(|f| f.name == name)
            .unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..]
            .iter()
            .map(|f| f.name.to_string())
            .collect();
        path.push(name.to_string());
        RegistryError::CircularDependency {
            module: name.to_string(),
            path,
        }
    }

    // Iterative so deep chains cannot exhaust the thread stack.
    fn visit(&mut self, root: &'g str) -> Result<(), RegistryError> {
        if self.colors.contains_key(root) {
            return Ok(());
        }
        self.enter(root);

        while let Some(frame) = self.stack.last_mut() {
            let deps = frame.deps;
            let Some(dep) = deps.get(frame.next) else {
                let name = frame.name;
                self.stack.pop();
                self.colors.insert(name, Color::Black);
                self.order.push(name.to_string());
                continue;
            };
            frame.next += 1;
            let module = frame.name;

            if (self.deps_of)(dep).is_none() {
                return Err(RegistryError::MissingDependency {
                    module: module.to_string(),
                    dependency: dep.clone(),
                });
            }
            match self.colors.get(dep.as_str()) {
                Some(Color::Black) => {}
                Some(Color::Gray) => return Err(self.cycle(dep)),
                None => self.enter(dep),
            }
        }
        Ok(())
    }
}

/// Compute an initialization order where every module follows all of its dependencies.
///
/// `deps_of` returns `None` for names that are not registered. The whole batch fails on
/// the first cycle or missing reference; no partial order is returned.
pub fn resolve<'g, I, F>(roots: I, deps_of: F) -> Result<Vec<String>, RegistryError>
where
    I: IntoIterator<Item = &'g str>,
    F: Fn(&str) -> Option<&'g [String]>,
{
    let mut walk = Walk {
        deps_of,
        colors: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    for root in roots {
        walk.visit(root)?;
    }
    Ok(walk.order)
}
