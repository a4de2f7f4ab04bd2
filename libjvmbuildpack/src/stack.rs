/// Stack id of the Bionic based run image that ships without a shell.
pub const BIONIC_TINY_STACK_ID: &str = "io.paketo.stacks.tiny";

/// Stack id of the Jammy based run image that ships without a shell.
pub const JAMMY_TINY_STACK_ID: &str = "io.buildpacks.stacks.jammy.tiny";

/// Stack id of the Jammy based run image that only carries static binaries.
pub const JAMMY_STATIC_STACK_ID: &str = "io.buildpacks.stacks.jammy.static";

/// Environment variable the platform sets to the id of the stack being built on.
pub const STACK_ID_ENV_VAR: &str = "CNB_STACK_ID";

/// What the run image can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCapability {
    /// A POSIX shell is available, so launch scripts can be used.
    Shell,
    /// No shell is available, processes must exec binaries directly.
    Shellless,
}

impl StackCapability {
    pub fn from_stack_id(stack_id: Option<&str>) -> Self {
        match stack_id {
            Some(BIONIC_TINY_STACK_ID | JAMMY_TINY_STACK_ID | JAMMY_STATIC_STACK_ID) => {
                Self::Shellless
            }
            _ => Self::Shell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_and_static_stacks_are_shellless() {
        for stack_id in [
            BIONIC_TINY_STACK_ID,
            JAMMY_TINY_STACK_ID,
            JAMMY_STATIC_STACK_ID,
        ] {
            assert_eq!(
                StackCapability::from_stack_id(Some(stack_id)),
                StackCapability::Shellless,
                "{stack_id}"
            );
        }
    }

    #[test]
    fn other_stacks_have_a_shell() {
        for stack_id in [
            "io.buildpacks.stacks.bionic",
            "io.buildpacks.stacks.jammy",
            "io.buildpacks.stacks.jammy.tiny.custom",
        ] {
            assert_eq!(
                StackCapability::from_stack_id(Some(stack_id)),
                StackCapability::Shell,
                "{stack_id}"
            );
        }
        assert_eq!(StackCapability::from_stack_id(None), StackCapability::Shell);
    }
}
