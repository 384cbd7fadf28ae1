pub mod cell_list;
pub mod criterion;
pub mod registry;
pub mod switch;
pub mod verlet_list;
