/// Declares a `Copy` identifier newtype backed by a v4 UUID.
#[macro_export]
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Ord,
            PartialOrd,
            Debug,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            pub fn unique() -> $name {
                $name(uuid::Uuid::new_v4())
            }
            pub fn nil() -> $name {
                $name(uuid::Uuid::nil())
            }
            pub const fn from_u128(value: u128) -> $name {
                $name(uuid::Uuid::from_u128(value))
            }
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> $name {
                $name(uuid)
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(id: &str) -> Result<$name, Self::Err> {
                let uuid = uuid::Uuid::parse_str(id)?;
                Ok($name(uuid))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::nil()
            }
        }
    };
}
