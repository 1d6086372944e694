pub mod attendance;
pub mod employee;
#[cfg(test)]
pub mod memory;
