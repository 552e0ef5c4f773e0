//! In-memory remote environment (testing and dry runs)
//!
//! `MemoryChain` behaves like the deployed components closely enough to
//! exercise a full provisioning run: it hands out deterministic addresses,
//! tracks who controls each component, keeps the classifier's weight array
//! and can charge a linear cost against each operation's resource limit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::address::Address;
use crate::component::{
    methods, Arg, ComponentKind, Confirmation, DeploymentHandle, ResourceLimit,
};
use crate::error::{ChainError, ChainResult};
use crate::traits::ChainClient;

/// Linear cost charged per operation: `base + per_word * payload_words`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    pub base: u64,
    pub per_word: u64,
}

impl CostModel {
    pub fn cost(&self, args: &[Arg]) -> u64 {
        let words: u64 = args.iter().map(Arg::words).sum();
        self.base.saturating_add(self.per_word.saturating_mul(words))
    }
}

/// One attempted operation, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainCall {
    Create {
        kind: ComponentKind,
        args: Vec<Arg>,
        limit: ResourceLimit,
    },
    Invoke {
        kind: ComponentKind,
        address: Address,
        method: String,
        args: Vec<Arg>,
        limit: ResourceLimit,
    },
}

#[derive(Debug)]
struct ComponentState {
    kind: ComponentKind,
    owner: Address,
    constructor_args: Vec<Arg>,
    weights: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FailureRule {
    Create(ComponentKind),
    Invoke {
        kind: ComponentKind,
        method: String,
        nth: Option<usize>,
    },
}

#[derive(Debug, Default)]
struct ChainState {
    next_index: u64,
    next_tx: u64,
    components: BTreeMap<Address, ComponentState>,
    creation_order: Vec<(ComponentKind, Address)>,
    calls: Vec<ChainCall>,
    invoke_counts: HashMap<(ComponentKind, String), usize>,
    failures: Vec<FailureRule>,
}

impl ChainState {
    fn next_transaction(&mut self) -> String {
        self.next_tx += 1;
        format!("0x{:064x}", self.next_tx)
    }
}

/// In-memory remote environment.
#[derive(Debug)]
pub struct MemoryChain {
    deployer: Address,
    cost_model: Option<CostModel>,
    state: Mutex<ChainState>,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChain {
    /// Environment whose operations are all submitted by a fixed deployer account.
    pub fn new() -> Self {
        Self {
            deployer: Address::from_index(0xdeb10),
            cost_model: None,
            state: Mutex::new(ChainState {
                // Component addresses start after the deployer's.
                next_index: 0x1000,
                ..ChainState::default()
            }),
        }
    }

    /// Charge `model` against every operation's resource limit.
    pub fn with_cost_model(mut self, model: CostModel) -> Self {
        self.cost_model = Some(model);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every creation of `kind` fail.
    pub fn fail_create(&self, kind: ComponentKind) {
        self.lock().failures.push(FailureRule::Create(kind));
    }

    /// Make every call of `method` on `kind` fail.
    pub fn fail_invoke(&self, kind: ComponentKind, method: &str) {
        self.lock().failures.push(FailureRule::Invoke {
            kind,
            method: method.to_string(),
            nth: None,
        });
    }

    /// Make only the `nth` (0-based) call of `method` on `kind` fail.
    pub fn fail_invoke_nth(&self, kind: ComponentKind, method: &str, nth: usize) {
        self.lock().failures.push(FailureRule::Invoke {
            kind,
            method: method.to_string(),
            nth: Some(nth),
        });
    }

    /// The account that submits every operation.
    pub fn deployer(&self) -> &Address {
        &self.deployer
    }

    /// Every attempted operation, in submission order.
    pub fn calls(&self) -> Vec<ChainCall> {
        self.lock().calls.clone()
    }

    /// Successfully created components, in creation order.
    pub fn created(&self) -> Vec<(ComponentKind, Address)> {
        self.lock().creation_order.clone()
    }

    pub fn created_kinds(&self) -> Vec<ComponentKind> {
        self.created().into_iter().map(|(kind, _)| kind).collect()
    }

    pub fn owner_of(&self, address: &Address) -> Option<Address> {
        self.lock().components.get(address).map(|c| c.owner.clone())
    }

    /// Current weight array of a classifier.
    pub fn weights_of(&self, address: &Address) -> Option<Vec<i64>> {
        self.lock().components.get(address).map(|c| c.weights.clone())
    }

    pub fn constructor_args_of(&self, address: &Address) -> Option<Vec<Arg>> {
        self.lock()
            .components
            .get(address)
            .map(|c| c.constructor_args.clone())
    }

    fn charge(&self, operation: &str, args: &[Arg], limit: ResourceLimit) -> ChainResult<()> {
        if let Some(model) = self.cost_model {
            let required = model.cost(args);
            if required > limit.0 {
                return Err(ChainError::ResourceLimitExceeded {
                    operation: operation.to_string(),
                    required,
                    limit: limit.0,
                });
            }
        }
        Ok(())
    }
}

fn rejected(operation: &str, reason: impl Into<String>) -> ChainError {
    ChainError::Rejected {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}

fn initialize_weights(
    component: &mut ComponentState,
    operation: &str,
    args: &[Arg],
) -> ChainResult<()> {
    let (offset, values) = match args {
        [Arg::Uint(offset), Arg::IntArray(values)] => (*offset as usize, values),
        _ => return Err(rejected(operation, "expected (uint offset, int[] weights)")),
    };
    if offset > component.weights.len() {
        return Err(rejected(
            operation,
            format!(
                "offset {} leaves a gap after {} weights",
                offset,
                component.weights.len()
            ),
        ));
    }
    for (i, value) in values.iter().enumerate() {
        match component.weights.get_mut(offset + i) {
            Some(slot) => *slot = *value,
            None => component.weights.push(*value),
        }
    }
    Ok(())
}

#[async_trait]
impl ChainClient for MemoryChain {
    async fn create(
        &self,
        kind: ComponentKind,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<DeploymentHandle> {
        let operation = format!("create {}", kind.artifact());
        let mut state = self.lock();
        state.calls.push(ChainCall::Create {
            kind,
            args: args.clone(),
            limit,
        });

        if state.failures.contains(&FailureRule::Create(kind)) {
            return Err(rejected(&operation, "injected failure"));
        }
        self.charge(&operation, &args, limit)?;

        state.next_index += 1;
        let address = Address::from_index(state.next_index);
        let transaction = state.next_transaction();

        let weights = args
            .iter()
            .find_map(|arg| match arg {
                Arg::IntArray(values) if kind == ComponentKind::Classifier => Some(values.clone()),
                _ => None,
            })
            .unwrap_or_default();

        state.components.insert(
            address.clone(),
            ComponentState {
                kind,
                owner: self.deployer.clone(),
                constructor_args: args,
                weights,
            },
        );
        state.creation_order.push((kind, address.clone()));

        Ok(DeploymentHandle {
            kind,
            address,
            transaction,
        })
    }

    async fn invoke(
        &self,
        handle: &DeploymentHandle,
        method: &str,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<Confirmation> {
        let operation = format!("{}.{}", handle.kind.artifact(), method);
        let mut state = self.lock();
        state.calls.push(ChainCall::Invoke {
            kind: handle.kind,
            address: handle.address.clone(),
            method: method.to_string(),
            args: args.clone(),
            limit,
        });

        let key = (handle.kind, method.to_string());
        let seen = *state.invoke_counts.get(&key).unwrap_or(&0);
        state.invoke_counts.insert(key, seen + 1);
        let injected = state.failures.iter().any(|rule| match rule {
            FailureRule::Invoke { kind, method: m, nth } => {
                *kind == handle.kind && m == method && nth.map_or(true, |n| n == seen)
            }
            FailureRule::Create(_) => false,
        });
        if injected {
            return Err(rejected(&operation, "injected failure"));
        }
        self.charge(&operation, &args, limit)?;

        let deployer = self.deployer.clone();
        let component = state
            .components
            .get_mut(&handle.address)
            .ok_or_else(|| ChainError::UnknownComponent(handle.address.to_string()))?;
        if component.kind != handle.kind {
            return Err(rejected(
                &operation,
                format!("component at {} is a {}", handle.address, component.kind),
            ));
        }
        if component.owner != deployer {
            return Err(ChainError::NotOwner {
                caller: deployer.to_string(),
                address: handle.address.to_string(),
            });
        }

        match method {
            methods::TRANSFER_OWNERSHIP => match args.as_slice() {
                [Arg::Address(new_owner)] => component.owner = new_owner.clone(),
                _ => return Err(rejected(&operation, "expected (address newOwner)")),
            },
            methods::INITIALIZE_WEIGHTS if component.kind == ComponentKind::Classifier => {
                initialize_weights(component, &operation, &args)?
            }
            _ => return Err(rejected(&operation, "unknown method")),
        }

        let transaction = state.next_transaction();
        let resource_used = self.cost_model.map(|m| m.cost(&args));
        Ok(Confirmation {
            transaction,
            resource_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> ResourceLimit {
        ResourceLimit(1_000_000)
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_addresses() {
        let chain = MemoryChain::new();
        let a = chain
            .create(ComponentKind::DataHandler, vec![], limit())
            .await
            .expect("create");
        let b = chain
            .create(ComponentKind::IncentiveMechanism, vec![Arg::Uint(1)], limit())
            .await
            .expect("create");

        assert_ne!(a.address, b.address);
        assert_ne!(a.transaction, b.transaction);
        assert_eq!(chain.owner_of(&a.address), Some(chain.deployer().clone()));
        assert_eq!(
            chain.created_kinds(),
            vec![ComponentKind::DataHandler, ComponentKind::IncentiveMechanism]
        );
    }

    #[tokio::test]
    async fn test_injected_create_failure() {
        let chain = MemoryChain::new();
        chain.fail_create(ComponentKind::Classifier);
        let err = chain
            .create(ComponentKind::Classifier, vec![], limit())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ChainError::Rejected { .. }));
        assert!(chain.created().is_empty());
        assert_eq!(chain.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cost_model_enforces_limit() {
        let chain = MemoryChain::new().with_cost_model(CostModel {
            base: 100,
            per_word: 10,
        });
        let ok = chain
            .create(ComponentKind::Classifier, vec![Arg::IntArray(vec![0; 10])], ResourceLimit(200))
            .await;
        assert!(ok.is_ok());

        let err = chain
            .create(ComponentKind::Classifier, vec![Arg::IntArray(vec![0; 11])], ResourceLimit(200))
            .await
            .expect_err("over limit");
        assert_eq!(
            err,
            ChainError::ResourceLimitExceeded {
                operation: "create SparsePerceptron".to_string(),
                required: 210,
                limit: 200,
            }
        );
    }

    #[tokio::test]
    async fn test_initialize_weights_appends_and_overwrites() {
        let chain = MemoryChain::new();
        let classifier = chain
            .create(
                ComponentKind::Classifier,
                vec![
                    Arg::StringArray(vec!["a".into(), "b".into()]),
                    Arg::IntArray(vec![1, 2]),
                    Arg::Int(0),
                    Arg::Int(5),
                ],
                limit(),
            )
            .await
            .expect("create");

        chain
            .invoke(
                &classifier,
                methods::INITIALIZE_WEIGHTS,
                vec![Arg::Uint(2), Arg::IntArray(vec![3, 4])],
                limit(),
            )
            .await
            .expect("append");
        chain
            .invoke(
                &classifier,
                methods::INITIALIZE_WEIGHTS,
                vec![Arg::Uint(1), Arg::IntArray(vec![9])],
                limit(),
            )
            .await
            .expect("overwrite");
        assert_eq!(chain.weights_of(&classifier.address), Some(vec![1, 9, 3, 4]));

        let err = chain
            .invoke(
                &classifier,
                methods::INITIALIZE_WEIGHTS,
                vec![Arg::Uint(10), Arg::IntArray(vec![1])],
                limit(),
            )
            .await
            .expect_err("gap");
        assert!(err.to_string().contains("gap"));
    }

    #[tokio::test]
    async fn test_transfer_is_one_time() {
        let chain = MemoryChain::new();
        let handle = chain
            .create(ComponentKind::DataHandler, vec![], limit())
            .await
            .expect("create");
        let new_owner = Address::from_index(42);

        chain
            .invoke(
                &handle,
                methods::TRANSFER_OWNERSHIP,
                vec![Arg::Address(new_owner.clone())],
                limit(),
            )
            .await
            .expect("transfer");
        assert_eq!(chain.owner_of(&handle.address), Some(new_owner.clone()));

        let err = chain
            .invoke(
                &handle,
                methods::TRANSFER_OWNERSHIP,
                vec![Arg::Address(new_owner)],
                limit(),
            )
            .await
            .expect_err("no longer owner");
        assert!(matches!(err, ChainError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_fail_invoke_nth_only_hits_that_call() {
        let chain = MemoryChain::new();
        chain.fail_invoke_nth(ComponentKind::Classifier, methods::INITIALIZE_WEIGHTS, 1);
        let classifier = chain
            .create(ComponentKind::Classifier, vec![Arg::IntArray(vec![])], limit())
            .await
            .expect("create");

        assert!(apply(&chain, &classifier, 0).await.is_ok());
        assert!(apply(&chain, &classifier, 1).await.is_err());
        assert!(apply(&chain, &classifier, 1).await.is_ok());
    }

    async fn apply(
        chain: &MemoryChain,
        classifier: &DeploymentHandle,
        offset: u64,
    ) -> ChainResult<Confirmation> {
        chain
            .invoke(
                classifier,
                methods::INITIALIZE_WEIGHTS,
                vec![Arg::Uint(offset), Arg::IntArray(vec![7])],
                limit(),
            )
            .await
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let chain = MemoryChain::new();
        let handle = chain
            .create(ComponentKind::Coordinator, vec![], limit())
            .await
            .expect("create");
        let err = chain
            .invoke(&handle, "selfDestruct", vec![], limit())
            .await
            .expect_err("unknown");
        assert!(err.to_string().contains("unknown method"));
    }
}
