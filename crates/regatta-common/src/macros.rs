/// Macro to define a UUID-backed identifier newtype.
///
/// Generates the struct together with `Display`, `FromStr`, `From<Uuid>`,
/// a random constructor and a nil check, so every identifier in the
/// workspace shares the same textual and serialized form.
///
/// # Usage
/// ```ignore
/// define_uuid_id!(
///     /// Identifier of a Raft server
///     ReplicaId
/// );
/// ```
#[macro_export]
macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub const fn new(id: uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier
            pub fn create_random_id() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// The nil identifier marks "not assigned yet"
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}
