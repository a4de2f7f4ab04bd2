pub(crate) mod base;
pub(crate) mod helper;
pub(crate) mod home;
