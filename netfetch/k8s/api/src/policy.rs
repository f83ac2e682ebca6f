pub mod cilium;

pub use self::cilium::{
    CiliumClusterwideNetworkPolicy, CiliumClusterwideNetworkPolicySpec, CiliumNetworkPolicy,
    CiliumNetworkPolicySpec, EndpointSelector, PolicyRule, Requirement, RuleEntry,
};
