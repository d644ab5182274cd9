//! Attribute sets and the builder that derives them from items.
//!
//! Every store operation addresses the backend with an [`AttributeSet`]
//! produced by [`AttributeQueryBuilder::build`]. Add, remove, update and get
//! all go through the same builder, so they agree on where a logical item
//! lives.
//!
//! # Per-kind attributes
//!
//! - Key items: class `Key`, application tag, fixed key type and size, and a
//!   fixed encrypt/decrypt-only capability policy.
//! - Password items: class `GenericPassword`, generic attribute, plus
//!   service and account attributes derived from the tag by suffixing.
//!
//! Shared items additionally carry the configured access group.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{SharingPolicy, StoreConfig};
use crate::error::{InvalidItem, StoreError};
use crate::item::{CredentialItem, ItemKind};

/// Suffix appended to a password tag to form its service attribute.
pub const PASSWORD_SERVICE_SUFFIX: &str = "PasswordService";

/// Suffix appended to a password tag to form its account attribute.
pub const PASSWORD_ACCOUNT_SUFFIX: &str = "PasswordAccount";

/// Key size, in bits, recorded for every stored key.
pub const KEY_SIZE_BITS: u32 = 256;

/// Backend item classes.
///
/// The store only writes `Key` and `GenericPassword`; the remaining classes
/// exist so a full wipe also clears entries written by other software.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemClass {
    Key,
    GenericPassword,
    InternetPassword,
    Certificate,
    Identity,
}

impl ItemClass {
    /// Every class the backend recognizes, in wipe order.
    pub const ALL: [ItemClass; 5] = [
        ItemClass::Key,
        ItemClass::GenericPassword,
        ItemClass::InternetPassword,
        ItemClass::Certificate,
        ItemClass::Identity,
    ];

    /// The class used to store items of `kind`, if any.
    pub fn for_kind(kind: ItemKind) -> Option<Self> {
        match kind {
            ItemKind::Key => Some(Self::Key),
            ItemKind::Password => Some(Self::GenericPassword),
            ItemKind::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::GenericPassword => "generic_password",
            Self::InternetPassword => "internet_password",
            Self::Certificate => "certificate",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key algorithm identifier recorded on key items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
}

/// Attribute names understood by backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    Class,
    AccessGroup,
    ApplicationTag,
    KeyType,
    KeySizeInBits,
    EffectiveKeySize,
    CanEncrypt,
    CanDecrypt,
    CanDerive,
    CanSign,
    CanVerify,
    CanWrap,
    CanUnwrap,
    Generic,
    Service,
    Account,
}

/// Value of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    Class(ItemClass),
    KeyType(KeyType),
    Data(Vec<u8>),
    Text(String),
    Integer(u32),
    Bool(bool),
}

impl AttributeValue {
    /// UTF-8 bytes of `s`.
    pub fn utf8(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Which partition of the backend an attribute set addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The caller's own partition.
    Private,

    /// The configured shared access group.
    Shared,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// The backend key for an entry: a map from attribute to value.
///
/// Ordering is canonical, so two sets built from the same item compare equal.
/// Payloads are never part of an attribute set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributeSet(BTreeMap<Attribute, AttributeValue>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set addressing every entry of `class` in the private partition.
    pub fn for_class(class: ItemClass) -> Self {
        Self::new().with(Attribute::Class, AttributeValue::Class(class))
    }

    /// Builder-style insert.
    pub fn with(mut self, attribute: Attribute, value: AttributeValue) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Builder-style access group.
    pub fn with_access_group(self, group: impl Into<String>) -> Self {
        self.with(Attribute::AccessGroup, AttributeValue::Text(group.into()))
    }

    pub fn insert(&mut self, attribute: Attribute, value: AttributeValue) -> Option<AttributeValue> {
        self.0.insert(attribute, value)
    }

    pub fn get(&self, attribute: Attribute) -> Option<&AttributeValue> {
        self.0.get(&attribute)
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.0.contains_key(&attribute)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Attribute, &AttributeValue)> {
        self.0.iter()
    }

    pub fn class(&self) -> Option<ItemClass> {
        match self.get(Attribute::Class) {
            Some(AttributeValue::Class(class)) => Some(*class),
            _ => None,
        }
    }

    pub fn access_group(&self) -> Option<&str> {
        match self.get(Attribute::AccessGroup) {
            Some(AttributeValue::Text(group)) => Some(group),
            _ => None,
        }
    }

    /// Whether `entry` is addressed by this set used as a query.
    ///
    /// Entries are partitioned by access group: a query without one only
    /// reaches private entries, a query with one only reaches that group.
    /// Every other attribute of the query must be present on the entry with
    /// an equal value.
    pub fn matches(&self, entry: &AttributeSet) -> bool {
        if self.access_group() != entry.access_group() {
            return false;
        }
        self.0
            .iter()
            .all(|(attribute, value)| entry.get(*attribute) == Some(value))
    }
}

/// Derives backend attribute sets from items.
///
/// Pure apart from its immutable configuration: the same item fields
/// (payload excluded) always produce the same set.
#[derive(Debug, Clone)]
pub struct AttributeQueryBuilder {
    shared_access_group: Option<String>,
    sharing_policy: SharingPolicy,
    service_suffix: String,
    account_suffix: String,
}

impl AttributeQueryBuilder {
    /// Create a builder for stores configured with `shared_access_group`.
    ///
    /// An empty group name is treated as no group.
    pub fn new(shared_access_group: Option<String>) -> Self {
        Self {
            shared_access_group: shared_access_group.filter(|g| !g.is_empty()),
            sharing_policy: SharingPolicy::default(),
            service_suffix: PASSWORD_SERVICE_SUFFIX.to_string(),
            account_suffix: PASSWORD_ACCOUNT_SUFFIX.to_string(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.shared_access_group.clone())
            .with_sharing_policy(config.sharing_policy)
            .with_password_suffixes(
                config.password_service_suffix.clone(),
                config.password_account_suffix.clone(),
            )
    }

    pub fn with_sharing_policy(mut self, policy: SharingPolicy) -> Self {
        self.sharing_policy = policy;
        self
    }

    /// Override the suffixes used to derive password service/account values.
    pub fn with_password_suffixes(
        mut self,
        service_suffix: impl Into<String>,
        account_suffix: impl Into<String>,
    ) -> Self {
        self.service_suffix = service_suffix.into();
        self.account_suffix = account_suffix.into();
        self
    }

    pub fn shared_access_group(&self) -> Option<&str> {
        self.shared_access_group.as_deref()
    }

    /// Service attribute value for a password tag.
    pub fn password_service(&self, tag: &str) -> String {
        format!("{}{}", tag, self.service_suffix)
    }

    /// Account attribute value for a password tag.
    pub fn password_account(&self, tag: &str) -> String {
        format!("{}{}", tag, self.account_suffix)
    }

    /// Resolve the access group an item is stored under.
    ///
    /// Returns `Ok(None)` for private items, and for shared items when no
    /// group is configured and the policy falls back to private.
    pub fn resolve_access_group(&self, item: &CredentialItem) -> Result<Option<&str>, StoreError> {
        if !item.is_shared {
            return Ok(None);
        }
        match (&self.shared_access_group, self.sharing_policy) {
            (Some(group), _) => Ok(Some(group.as_str())),
            (None, SharingPolicy::FallbackToPrivate) => {
                tracing::warn!(
                    tag = %item.tag,
                    kind = %item.kind,
                    "Shared item addressed without a configured access group; using private scope"
                );
                Ok(None)
            }
            (None, SharingPolicy::Reject) => Err(StoreError::SharingUnavailable {
                tag: item.tag.clone(),
            }),
        }
    }

    /// Build the attribute set that locates and stores `item`.
    pub fn build(&self, item: &CredentialItem) -> Result<AttributeSet, StoreError> {
        item.validate(false)?;

        let mut attributes = match item.kind {
            ItemKind::Key => Self::key_attributes(&item.tag),
            ItemKind::Password => self.password_attributes(&item.tag),
            ItemKind::None => return Err(InvalidItem::UnclassifiedKind.into()),
        };

        if let Some(group) = self.resolve_access_group(item)? {
            attributes.insert(Attribute::AccessGroup, AttributeValue::Text(group.to_string()));
        }

        Ok(attributes)
    }

    /// Query addressing every entry of `class` in `scope`.
    ///
    /// Returns `None` for the shared scope when no group is configured.
    pub fn class_query(&self, class: ItemClass, scope: Scope) -> Option<AttributeSet> {
        match scope {
            Scope::Private => Some(AttributeSet::for_class(class)),
            Scope::Shared => self
                .shared_access_group
                .as_ref()
                .map(|group| AttributeSet::for_class(class).with_access_group(group.clone())),
        }
    }

    fn key_attributes(tag: &str) -> AttributeSet {
        AttributeSet::for_class(ItemClass::Key)
            .with(Attribute::ApplicationTag, AttributeValue::utf8(tag))
            .with(Attribute::KeyType, AttributeValue::KeyType(KeyType::Rsa))
            .with(Attribute::KeySizeInBits, AttributeValue::Integer(KEY_SIZE_BITS))
            .with(Attribute::EffectiveKeySize, AttributeValue::Integer(KEY_SIZE_BITS))
            .with(Attribute::CanEncrypt, AttributeValue::Bool(true))
            .with(Attribute::CanDecrypt, AttributeValue::Bool(true))
            .with(Attribute::CanDerive, AttributeValue::Bool(false))
            .with(Attribute::CanSign, AttributeValue::Bool(false))
            .with(Attribute::CanVerify, AttributeValue::Bool(false))
            .with(Attribute::CanWrap, AttributeValue::Bool(false))
            .with(Attribute::CanUnwrap, AttributeValue::Bool(false))
    }

    fn password_attributes(&self, tag: &str) -> AttributeSet {
        AttributeSet::for_class(ItemClass::GenericPassword)
            .with(Attribute::Generic, AttributeValue::utf8(tag))
            .with(Attribute::Service, AttributeValue::utf8(&self.password_service(tag)))
            .with(Attribute::Account, AttributeValue::utf8(&self.password_account(tag)))
    }
}
