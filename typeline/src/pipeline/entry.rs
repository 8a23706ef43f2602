//! Pipeline entries: single steps, parallel groups and forks.

use crate::step::StepFactory;
use crate::store::Store;
use std::fmt;
use std::sync::Arc;

/// A synchronous predicate over the current store state.
pub type Condition = Arc<dyn Fn(&Store) -> bool + Send + Sync>;

/// One element of a pipeline plan.
pub enum Entry<K> {
    /// A single step.
    Step(StepFactory<K>),
    /// Steps with no ordering constraint among themselves.
    Parallel(Vec<StepFactory<K>>),
    /// A branch point selecting one of two sub-plans.
    Fork(ForkGroup<K>),
}

impl<K> Entry<K> {
    /// Returns a short label for the entry kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Step(_) => "step",
            Self::Parallel(_) => "parallel",
            Self::Fork(_) => "fork",
        }
    }
}

impl<K> Clone for Entry<K> {
    fn clone(&self) -> Self {
        match self {
            Self::Step(factory) => Self::Step(factory.clone()),
            Self::Parallel(factories) => Self::Parallel(factories.clone()),
            Self::Fork(group) => Self::Fork(group.clone()),
        }
    }
}

impl<K> fmt::Debug for Entry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(factory) => f.debug_tuple("Step").field(factory).finish(),
            Self::Parallel(factories) => f
                .debug_tuple("Parallel")
                .field(&factories.len())
                .finish(),
            Self::Fork(group) => f.debug_tuple("Fork").field(group).finish(),
        }
    }
}

impl<K> From<StepFactory<K>> for Entry<K> {
    fn from(factory: StepFactory<K>) -> Self {
        Self::Step(factory)
    }
}

impl<K> From<ForkGroup<K>> for Entry<K> {
    fn from(group: ForkGroup<K>) -> Self {
        Self::Fork(group)
    }
}

/// A condition plus the two entry lists it chooses between.
pub struct ForkGroup<K> {
    condition: Condition,
    when_true: Vec<Entry<K>>,
    when_false: Vec<Entry<K>>,
}

impl<K> ForkGroup<K> {
    /// Creates a fork group.
    pub fn new<F>(condition: F, when_true: Vec<Entry<K>>, when_false: Vec<Entry<K>>) -> Self
    where
        F: Fn(&Store) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Arc::new(condition),
            when_true,
            when_false,
        }
    }

    /// Evaluates the condition against the store.
    #[must_use]
    pub fn evaluate(&self, store: &Store) -> bool {
        (self.condition)(store)
    }

    /// Returns the entries for the given branch.
    #[must_use]
    pub fn branch(&self, taken: bool) -> &[Entry<K>] {
        if taken {
            &self.when_true
        } else {
            &self.when_false
        }
    }
}

impl<K> Clone for ForkGroup<K> {
    fn clone(&self) -> Self {
        Self {
            condition: Arc::clone(&self.condition),
            when_true: self.when_true.clone(),
            when_false: self.when_false.clone(),
        }
    }
}

impl<K> fmt::Debug for ForkGroup<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkGroup")
            .field("when_true", &self.when_true)
            .field("when_false", &self.when_false)
            .finish_non_exhaustive()
    }
}

/// Groups steps to run concurrently.
pub fn parallel<K>(factories: impl IntoIterator<Item = StepFactory<K>>) -> Entry<K> {
    Entry::Parallel(factories.into_iter().collect())
}

/// Branches on the store state at the point the fork is reached.
pub fn fork<K, F, T, E>(
    condition: F,
    when_true: impl IntoIterator<Item = T>,
    when_false: impl IntoIterator<Item = E>,
) -> Entry<K>
where
    F: Fn(&Store) -> bool + Send + Sync + 'static,
    T: Into<Entry<K>>,
    E: Into<Entry<K>>,
{
    Entry::Fork(ForkGroup::new(
        condition,
        when_true.into_iter().map(Into::into).collect(),
        when_false.into_iter().map(Into::into).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{create_key, Key};
    use crate::step::{define_step, NoOpAction, Step};

    struct Keys {
        flag: Key<bool>,
    }

    fn noop(name: &'static str) -> StepFactory<Keys> {
        define_step(move |_keys: &Keys| Step::new(name, NoOpAction))
    }

    #[test]
    fn test_parallel_collects_members() {
        let entry = parallel([noop("a"), noop("b")]);

        assert_eq!(entry.kind(), "parallel");
        match entry {
            Entry::Parallel(members) => assert_eq!(members.len(), 2),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn test_fork_selects_branch() {
        let keys = Keys {
            flag: create_key("flag"),
        };
        let flag = keys.flag.clone();
        let entry = fork(
            move |store| store.get(&flag).unwrap_or(false),
            [noop("yes")],
            [parallel([noop("n1"), noop("n2")]), noop("n3").into()],
        );

        let Entry::Fork(group) = entry else {
            panic!("expected fork");
        };

        let store = Store::new();
        assert!(!group.evaluate(&store));
        assert_eq!(group.branch(false).len(), 2);

        store.set(&keys.flag, true);
        assert!(group.evaluate(&store));
        assert_eq!(group.branch(true)[0].kind(), "step");
    }

    #[test]
    fn test_entry_clone() {
        let entry: Entry<Keys> = fork(|_| true, [noop("a")], Vec::<Entry<Keys>>::new());
        let cloned = entry.clone();
        assert_eq!(cloned.kind(), "fork");
    }
}
