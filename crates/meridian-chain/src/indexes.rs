use std::any::Any;
use std::collections::BTreeMap;

use meridian_store::SecondaryIndex;
use meridian_types::AccountId;

use crate::objects::AccountObject;

/// Account lookup by name. Name uniqueness across all live accounts is
/// enforced by the account-create evaluator through this index.
#[derive(Default)]
pub struct AccountNameIndex {
    by_name: BTreeMap<String, AccountId>,
}

impl AccountNameIndex {
    pub fn find(&self, name: &str) -> Option<AccountId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl SecondaryIndex<AccountObject> for AccountNameIndex {
    fn object_inserted(&mut self, obj: &AccountObject) {
        self.by_name.insert(obj.name.clone(), obj.id());
    }

    fn about_to_modify(&mut self, obj: &AccountObject) {
        self.by_name.remove(&obj.name);
    }

    fn object_modified(&mut self, obj: &AccountObject) {
        self.by_name.insert(obj.name.clone(), obj.id());
    }

    fn object_removed(&mut self, obj: &AccountObject) {
        self.by_name.remove(&obj.name);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
