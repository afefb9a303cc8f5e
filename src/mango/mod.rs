// Mango协议域 / Mango protocol domain
pub mod accounts;
pub mod decoder;
pub mod events;
pub mod group;

#[cfg(test)]
mod tests;
