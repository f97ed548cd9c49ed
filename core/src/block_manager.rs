//! Basic-Block Manager (BBM, spec §4.4).
//!
//! A thin lookup-or-create wrapper keyed by code address, enforcing the
//! one-block-per-address invariant (spec §8) on top of
//! [`crate::ir::IrFunction`]'s own address map. Blocks created here start
//! as placeholders (`trap(); unreachable`, spec §4.4) until the function
//! translator actually reaches that address and opens them for insertion.
pub struct BlockManager;

impl BlockManager {
    /// Return the existing block at `address`, or create a new placeholder
    /// block there (spec §4.4 `get_or_create`).
    pub fn get_or_create(func: &mut crate::ir::IrFunction, address: u64) -> crate::ir::BlockId {
        if let Some(id) = func.find_block(address) {
            return id;
        }
        func.create_placeholder_block(address, format!("bb_{address:x}"))
    }
}
