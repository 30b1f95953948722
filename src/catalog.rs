//! Typed wrappers for well-known operations
//!
//! Every wrapper is a thin alias for [`ApiClient::call_scoped`]; operations
//! missing here are still reachable through it.

use crate::client::ApiClient;
use crate::error::ApiCallError;
use crate::key::CallParameters;
use crate::response::ApiResult;

macro_rules! operations {
    ($( $(#[$meta:meta])* $method:ident => $scope:literal / $operation:literal; )*) => {
        impl ApiClient {
            $(
                $(#[$meta])*
                pub async fn $method(&self, params: CallParameters) -> Result<ApiResult, ApiCallError> {
                    self.call_scoped($scope, $operation, params).await
                }
            )*
        }

        /// `(scope, operation)` pairs with a typed wrapper
        pub const OPERATIONS: &[(&str, &str)] = &[$(($scope, $operation)),*];
    };
}

operations! {
    /// Characters on the account
    characters => "account" / "Characters";
    /// Subscription status of the account
    account_status => "account" / "AccountStatus";
    /// Access mask and expiry of the key in use
    api_key_info => "account" / "APIKeyInfo";

    character_sheet => "char" / "CharacterSheet";
    skill_queue => "char" / "SkillQueue";
    /// Requires `characterID`; `accountKey`, `fromID` and `rowCount` are optional
    wallet_journal => "char" / "WalletJournal";
    char_account_balance => "char" / "AccountBalance";

    corporation_sheet => "corp" / "CorporationSheet";
    corp_account_balance => "corp" / "AccountBalance";
    member_tracking => "corp" / "MemberTracking";

    /// Requires `names`, a comma separated list
    character_id => "eve" / "CharacterID";
    /// Requires `ids`, a comma separated list
    character_name => "eve" / "CharacterName";
    ref_types => "eve" / "RefTypes";

    jumps => "map" / "Jumps";
    kills => "map" / "Kills";
    sovereignty => "map" / "Sovereignty";

    /// Public; no credentials needed
    server_status => "server" / "ServerStatus";
}
