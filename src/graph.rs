//! Reverse-mode driver: orders the graph below a root and runs every backward
//! rule after all of its consumers have run theirs.

use std::collections::HashSet;

use crate::{config::ExecutorConfig, node::Node, tensor::Tensor};

#[derive(Debug, Default, Clone, Copy)]
pub struct GraphExecutor {
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Every node reachable from `root`, each listed after all of its operands.
    ///
    /// Uses an explicit stack, so arbitrarily deep graphs are fine.
    pub fn topological_order(root: &Tensor) -> Vec<Tensor> {
        let mut order = Vec::new();
        let mut visited: HashSet<*const Node> = HashSet::new();
        // (node, operands already scheduled)
        let mut stack = vec![(root.clone(), false)];

        while let Some((tensor, expanded)) = stack.pop() {
            if expanded {
                order.push(tensor);
                continue;
            }
            if !visited.insert(tensor.id()) {
                continue;
            }
            let operands = tensor.prev();
            stack.push((tensor, true));
            for operand in operands.into_iter().rev() {
                if !visited.contains(&operand.id()) {
                    stack.push((operand, false));
                }
            }
        }

        order
    }

    /// Seeds `root` with ones and propagates gradients to every node below it.
    ///
    /// Derived nodes have their gradients reset first so each pass starts
    /// clean; leaves keep accumulating until their owner clears them.
    pub fn run(&self, root: &Tensor) {
        let order = Self::topological_order(root);
        log::debug!(
            "backward from {:?}: {} node(s), reclaim={}",
            root.name(),
            order.len(),
            self.config.reclaim
        );

        for tensor in &order {
            if tensor.node().has_backward() {
                tensor.node().fill_grad(0.0);
            }
        }
        root.node().fill_grad(1.0);

        let mut released = 0usize;
        for tensor in order.iter().rev() {
            log::trace!("backward through {:?}", tensor.name());
            let node = tensor.node();
            node.run_backward();
            if self.config.reclaim && node.is_ephemeral() && node.release() {
                released += 1;
            }
        }

        if self.config.reclaim {
            log::debug!("released edges of {released} ephemeral node(s)");
        }
    }
}
