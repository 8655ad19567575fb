//! Machine assembly: registering spaces, wiring forwards, and validating
//! the resulting bus graph.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{AccessError, BankError, ConfigError};
use crate::map::{validate_geometry, Direction};
use crate::space::{AddressSpace, MapEntryReport, SpaceConfig};
use crate::width::AccessWidth;

/// Shared handle to a registered address space.
///
/// Handles are how configured devices and front-ends reach a space after
/// registration; cloning is cheap and all clones address the same space.
#[derive(Clone)]
pub struct SpaceHandle {
    inner: Rc<RefCell<AddressSpace>>,
}

impl SpaceHandle {
    fn new(space: AddressSpace) -> Self {
        Self {
            inner: Rc::new(RefCell::new(space)),
        }
    }

    /// The space's construction-time shape.
    #[must_use]
    pub fn config(&self) -> SpaceConfig {
        self.inner.borrow().config().clone()
    }

    /// Reads a `width`-wide value at `addr`. See [`AddressSpace::read`].
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnsupportedWidth`] when `width` exceeds the
    /// space's native width, here or in a forwarded-to space.
    pub fn read(&self, addr: u64, width: AccessWidth) -> Result<u64, AccessError> {
        self.inner.borrow_mut().read(addr, width)
    }

    /// Writes a `width`-wide value at `addr`. See [`AddressSpace::write`].
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnsupportedWidth`] when `width` exceeds the
    /// space's native width, here or in a forwarded-to space.
    pub fn write(&self, addr: u64, width: AccessWidth, value: u64) -> Result<(), AccessError> {
        self.inner.borrow_mut().write(addr, width, value)
    }

    /// Installed entries for one direction in priority order.
    #[must_use]
    pub fn map_report(&self, direction: Direction) -> Vec<MapEntryReport> {
        self.inner.borrow().map_report(direction)
    }

    /// Selects the page a bank window exposes. See
    /// [`AddressSpace::select_bank`].
    ///
    /// # Errors
    ///
    /// Returns [`BankError::UnknownBank`] for an uninstalled identifier, and
    /// [`BankError::OutOfRange`] per the bank's policy.
    pub fn select_bank(&self, bank: usize, page: usize) -> Result<usize, BankError> {
        self.inner.borrow().select_bank(bank, page)
    }

    fn label(&self) -> String {
        let space = self.inner.borrow();
        format!("{}:{}", space.config().device, space.config().name)
    }

    fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

struct PendingForward {
    from: SpaceHandle,
    start: u64,
    end: u64,
    mirror: u64,
    to: SpaceHandle,
    base: u64,
}

/// Assembles a [`Machine`] from address spaces and forwarding edges.
///
/// Forwards are recorded here and applied at [`MachineBuilder::freeze`], so
/// the whole graph is validated (endpoint registration, acyclicity) in one
/// place before any dispatch can happen.
#[derive(Default)]
pub struct MachineBuilder {
    spaces: Vec<SpaceHandle>,
    forwards: Vec<PendingForward>,
}

impl MachineBuilder {
    /// Starts an empty machine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a built space, returning its shared handle.
    pub fn add_space(&mut self, space: AddressSpace) -> SpaceHandle {
        let handle = SpaceHandle::new(space);
        self.spaces.push(handle.clone());
        handle
    }

    /// Records a forwarding window: accesses to `start..=end` in `from`
    /// re-enter `to` at `base + (addr - start)`. Applied and validated at
    /// freeze time.
    pub fn forward(
        &mut self,
        from: &SpaceHandle,
        start: u64,
        end: u64,
        mirror: u64,
        to: &SpaceHandle,
        base: u64,
    ) -> &mut Self {
        self.forwards.push(PendingForward {
            from: from.clone(),
            start,
            end,
            mirror,
            to: to.clone(),
            base,
        });
        self
    }

    /// Validates the bus graph, applies all forwards, and produces the
    /// frozen machine.
    ///
    /// Every check (endpoint registration, window geometry, acyclicity)
    /// runs over the pending forward list before any space is touched, so a
    /// failed freeze leaves the registered spaces exactly as they were
    /// built: no forward is half-installed behind a live [`SpaceHandle`].
    ///
    /// # Errors
    ///
    /// Fails when a forward references an unregistered space, a forward's
    /// window geometry is invalid, or the forwarding graph contains a cycle.
    pub fn freeze(self) -> Result<Machine, ConfigError> {
        for forward in &self.forwards {
            for endpoint in [&forward.from, &forward.to] {
                if !self.spaces.iter().any(|s| s.ptr_id() == endpoint.ptr_id()) {
                    return Err(ConfigError::ForwardTargetNotRegistered {
                        space: endpoint.label(),
                    });
                }
            }
        }

        for forward in &self.forwards {
            let from = forward.from.inner.borrow();
            let config = from.config();
            validate_geometry(
                forward.start,
                forward.end,
                config.native_width,
                forward.mirror,
                config.native_width,
                config.addr_mask,
            )?;
        }

        self.validate_acyclic()?;

        for forward in &self.forwards {
            forward.from.inner.borrow_mut().install_forward(
                forward.start,
                forward.end,
                forward.mirror,
                &forward.to.inner,
                forward.base,
            )?;
        }

        Ok(Machine {
            spaces: self.spaces,
        })
    }

    /// Depth-first search over the pending forwarding edges; any back edge
    /// is a cycle.
    fn validate_acyclic(&self) -> Result<(), ConfigError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit(
            spaces: &[SpaceHandle],
            edges: &[Vec<usize>],
            marks: &mut [Mark],
            path: &mut Vec<usize>,
            node: usize,
        ) -> Result<(), ConfigError> {
            marks[node] = Mark::InProgress;
            path.push(node);

            for &next in &edges[node] {
                match marks[next] {
                    Mark::InProgress => {
                        let mut labels: Vec<String> = path
                            .iter()
                            .skip_while(|index| **index != next)
                            .map(|index| spaces[*index].label())
                            .collect();
                        labels.push(spaces[next].label());
                        return Err(ConfigError::ForwardingCycle {
                            path: labels.join(" -> "),
                        });
                    }
                    Mark::Unvisited => visit(spaces, edges, marks, path, next)?,
                    Mark::Done => {}
                }
            }

            path.pop();
            marks[node] = Mark::Done;
            Ok(())
        }

        let index_of = |handle: &SpaceHandle| {
            self.spaces
                .iter()
                .position(|s| s.ptr_id() == handle.ptr_id())
        };
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); self.spaces.len()];
        for forward in &self.forwards {
            let (Some(from), Some(to)) = (index_of(&forward.from), index_of(&forward.to)) else {
                continue;
            };
            if !edges[from].contains(&to) {
                edges[from].push(to);
            }
        }

        let mut marks = vec![Mark::Unvisited; self.spaces.len()];
        let mut path = Vec::new();
        for node in 0..self.spaces.len() {
            if marks[node] == Mark::Unvisited {
                visit(&self.spaces, &edges, &mut marks, &mut path, node)?;
            }
        }
        Ok(())
    }
}

/// A frozen machine: registered spaces with a validated forwarding graph.
pub struct Machine {
    spaces: Vec<SpaceHandle>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("spaces", &self.spaces.len())
            .finish()
    }
}

impl Machine {
    /// Looks up a space by owning device and space name.
    #[must_use]
    pub fn space(&self, device: &str, name: &str) -> Option<SpaceHandle> {
        self.spaces
            .iter()
            .find(|handle| {
                let space = handle.inner.borrow();
                space.config().device == device && space.config().name == name
            })
            .cloned()
    }

    /// Handles of every registered space, in registration order.
    #[must_use]
    pub fn spaces(&self) -> &[SpaceHandle] {
        &self.spaces
    }
}

#[cfg(test)]
mod tests {
    use super::MachineBuilder;
    use crate::error::ConfigError;
    use crate::map::Direction;
    use crate::space::{AddressSpaceBuilder, SpaceConfig};
    use crate::width::AccessWidth;

    fn space(device: &str, name: &str) -> AddressSpaceBuilder {
        AddressSpaceBuilder::new(SpaceConfig {
            device: device.to_owned(),
            name: name.to_owned(),
            native_width: AccessWidth::Byte,
            ..SpaceConfig::default()
        })
    }

    #[test]
    fn freeze_rejects_forwarding_cycles_with_a_readable_path() {
        let mut machine = MachineBuilder::new();
        let a = machine.add_space(space("cpu", "program").build());
        let b = machine.add_space(space("sub", "program").build());
        machine.forward(&a, 0x0000, 0x0FFF, 0, &b, 0x0000);
        machine.forward(&b, 0x0000, 0x0FFF, 0, &a, 0x0000);

        let err = machine.freeze().expect_err("cycle must be rejected");
        match err {
            ConfigError::ForwardingCycle { path } => {
                assert!(path.contains("cpu:program"));
                assert!(path.contains("sub:program"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn freeze_rejects_self_forwarding() {
        let mut machine = MachineBuilder::new();
        let a = machine.add_space(space("cpu", "program").build());
        machine.forward(&a, 0x0000, 0x00FF, 0, &a, 0x0100);

        assert!(matches!(
            machine.freeze(),
            Err(ConfigError::ForwardingCycle { .. })
        ));
    }

    #[test]
    fn failed_freeze_leaves_no_forward_installed() {
        let mut machine = MachineBuilder::new();
        let a = machine.add_space(space("cpu", "program").build());
        let b = machine.add_space(space("sub", "program").build());
        machine.forward(&a, 0x0000, 0x0FFF, 0, &b, 0x0000);
        machine.forward(&b, 0x0000, 0x0FFF, 0, &a, 0x0000);

        assert!(matches!(
            machine.freeze(),
            Err(ConfigError::ForwardingCycle { .. })
        ));

        for handle in [&a, &b] {
            for direction in [Direction::Read, Direction::Write] {
                assert!(
                    handle.map_report(direction).is_empty(),
                    "rejected forward persisted in {}", handle.label()
                );
            }
        }
        // Handles the caller kept still dispatch, and the rejected window
        // reads as plain open bus.
        let value = a.read(0x0000, AccessWidth::Byte).expect("native width");
        assert_eq!(value, 0xFF);
    }

    #[test]
    fn failed_freeze_skips_valid_forwards_recorded_before_the_bad_one() {
        let mut machine = MachineBuilder::new();
        let a = machine.add_space(space("cpu", "program").build());
        let b = machine.add_space(space("sub", "program").build());
        machine.forward(&a, 0x0000, 0x00FF, 0, &b, 0x0000);
        machine.forward(&b, 0x0100, 0x00FF, 0, &a, 0x0000);

        assert!(matches!(
            machine.freeze(),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(a.map_report(Direction::Read).is_empty());
        assert!(b.map_report(Direction::Read).is_empty());
    }

    #[test]
    fn freeze_rejects_unregistered_endpoints() {
        let mut machine = MachineBuilder::new();
        let a = machine.add_space(space("cpu", "program").build());

        let mut other = MachineBuilder::new();
        let foreign = other.add_space(space("rogue", "program").build());

        machine.forward(&a, 0x0000, 0x00FF, 0, &foreign, 0x0000);
        assert!(matches!(
            machine.freeze(),
            Err(ConfigError::ForwardTargetNotRegistered { .. })
        ));
    }

    #[test]
    fn machines_expose_spaces_by_device_and_name() {
        let mut machine = MachineBuilder::new();
        machine.add_space(space("cpu", "program").build());
        machine.add_space(space("cpu", "io").build());
        let machine = machine.freeze().expect("acyclic");

        assert!(machine.space("cpu", "io").is_some());
        assert!(machine.space("cpu", "vram").is_none());
        assert_eq!(machine.spaces().len(), 2);
    }
}
