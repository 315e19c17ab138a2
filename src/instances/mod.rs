mod ini;
mod registry;

pub use ini::{read_ini_value, read_rcon_password_from_ini};
pub use registry::{
    resolve_rcon_password, InstanceRegistry, RegistryError, ServerInstance, ServerTarget,
    DEFAULT_INSTANCE_ID,
};
