mod exchange;
mod local_infection;

pub use exchange::ExchangeSystem;
pub use local_infection::LocalInfectionSystem;
