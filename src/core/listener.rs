use crate::core::potential::PotentialId;

/// A resolved event, as reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Particle whose agent carried the event.
    pub particle: usize,
    /// Other particle of a pair event.
    pub partner: Option<usize>,
    pub potential: PotentialId,
    /// Step-local time of the event.
    pub time: f64,
    /// Elapsed simulation time of the event.
    pub sim_time: f64,
    /// Potential energy gained by the event.
    pub energy_change: f64,
    pub virial: f64,
}

/// Observer called once per resolved event, after the response is applied and
/// before the schedule is repaired.
pub trait CollisionListener {
    fn collision_action(&mut self, event: &CollisionEvent);
}

impl<F: FnMut(&CollisionEvent)> CollisionListener for F {
    fn collision_action(&mut self, event: &CollisionEvent) {
        self(event)
    }
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn CollisionListener>)>,
}

impl Listeners {
    pub fn add(&mut self, listener: Box<dyn CollisionListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> Option<Box<dyn CollisionListener>> {
        let pos = self.entries.iter().position(|(lid, _)| *lid == id)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn notify(&mut self, event: &CollisionEvent) {
        for (_, listener) in &mut self.entries {
            listener.collision_action(event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn event(particle: usize) -> CollisionEvent {
        CollisionEvent {
            particle,
            partner: None,
            potential: PotentialId(0),
            time: 0.0,
            sim_time: 0.0,
            energy_change: 0.0,
            virial: 0.0,
        }
    }

    #[test]
    fn closures_are_listeners_and_can_be_removed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();
        let sink = Rc::clone(&seen);
        let id = listeners.add(Box::new(move |e: &CollisionEvent| {
            sink.borrow_mut().push(e.particle)
        }));
        listeners.notify(&event(4));
        assert!(listeners.remove(id).is_some());
        assert!(listeners.remove(id).is_none());
        listeners.notify(&event(5));
        assert_eq!(*seen.borrow(), vec![4]);
        assert_eq!(listeners.len(), 0);
    }
}
