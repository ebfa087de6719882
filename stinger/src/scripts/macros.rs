/// Generates a unit struct wrapping a preprocessed script fetched from the
/// process-wide registry by command name.
#[macro_export]
macro_rules! generate_script_struct {
    ($struct_name:ident, $command_name:expr) => {
        #[derive(Clone, Copy)]
        pub struct $struct_name(pub &'static $crate::scripts::registry::RegisteredScript);

        impl $struct_name {
            pub fn new() -> Self {
                match $crate::scripts::registry::SCRIPTS.get($command_name) {
                    Ok(script) => $struct_name(script),
                    Err(e) => panic!("Error: {:?}", e),
                }
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}
