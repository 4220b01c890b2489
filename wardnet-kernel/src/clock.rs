use std::sync::Arc;
use time::OffsetDateTime;

/// Horloge injectable : le registre et le moniteur de liveness ne lisent
/// jamais l'heure système directement, ce qui rend les sweeps testables
/// sans attendre le temps réel.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
