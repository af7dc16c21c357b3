//! Scenario files and their replay.
//!
//! A scenario is a JSON document naming accounts by label; each label maps to
//! `AccountId::from_label`. Steps run in file order, each at its own
//! timestamp, against one gauge wired to in-memory collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sluice_boost::{BoostEvent, BoostLedger, BoostLedgerState, SharedBoostLedger};
use sluice_core::config::SluiceConfig;
use sluice_core::constants::{SCALE, WEEK, week_start};
use sluice_core::error::SluiceError;
use sluice_core::memory::{MemoryEscrow, MemoryTokenLedger, MemoryWeights};
use sluice_core::schedule::HalvingSchedule;
use sluice_core::traits::LiquidityManager;
use sluice_core::{AccountId, Context, TokenId};
use sluice_gauge::{Collaborators, Gauge, GaugeEvent, GaugeState, HoldingManager};

fn default_gauge() -> String {
    "gauge".into()
}

fn default_admin() -> String {
    "admin".into()
}

fn default_staking_token() -> String {
    "lp".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_gauge")]
    pub gauge: String,
    #[serde(default = "default_admin")]
    pub admin: String,
    #[serde(default = "default_staking_token")]
    pub staking_token: String,
    /// Timestamp the gauge is created at.
    pub start: u64,
    /// Weight schedule; full weight from time zero when empty.
    #[serde(default)]
    pub weights: Vec<WeightEntry>,
    #[serde(default)]
    pub activation: u64,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightEntry {
    pub from: u64,
    pub weight: u128,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at: u64,
    #[serde(default = "default_admin")]
    pub sender: String,
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Lock `amount` in the escrow for `account` until `weeks` after the step.
    Lock { account: String, amount: u128, weeks: u64 },
    Mint { token: String, account: String, amount: u128 },
    Deposit {
        amount: u128,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        use_manager: bool,
    },
    Withdraw {
        amount: u128,
        #[serde(default)]
        receiver: Option<String>,
    },
    TransferStake { to: String, amount: u128 },
    Checkpoint { account: String },
    Kick { account: String },
    Boost { receiver: String, amount: u128, weeks: u64 },
    Unboost { delegator: String, index: usize, amount: u128 },
    ToggleVoteSharing { staker: String },
    AcceptSharedVote { owner: String },
    RejectSharedVote,
    RegisterRewardToken {
        token: String,
        distributor: String,
        #[serde(default)]
        period_length: Option<u64>,
    },
    UnregisterRewardToken { token: String },
    SetRewardDistributor { token: String, distributor: String },
    DepositReward { token: String, amount: u128 },
    Claim {
        #[serde(default)]
        account: Option<String>,
        #[serde(default)]
        to: Option<String>,
    },
    /// Claim the listed tokens, including unregistered ones.
    ClaimHistorical {
        #[serde(default)]
        account: Option<String>,
        #[serde(default)]
        to: Option<String>,
        tokens: Vec<String>,
    },
    SetRewardsReceiver {
        #[serde(default)]
        receiver: Option<String>,
    },
    DisableGauge,
    /// Install a `HoldingManager` at `address`, or remove the current one.
    SetLiquidityManager {
        #[serde(default)]
        address: Option<String>,
    },
    DeactivateManager { address: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub at: u64,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub staked: u128,
    pub working: u128,
    pub accumulated: u128,
    pub voting_power: u128,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub accounts: BTreeMap<String, AccountSummary>,
    pub gauge: GaugeState,
    pub boosts: BoostLedgerState,
    pub gauge_events: Vec<GaugeEvent>,
    pub boost_events: Vec<BoostEvent>,
}

pub struct Simulation {
    escrow: Arc<MemoryEscrow>,
    boosts: SharedBoostLedger,
    tokens: Arc<MemoryTokenLedger>,
    gauge: Gauge,
    staking_token: TokenId,
    managers: BTreeMap<String, Arc<HoldingManager>>,
    labels: BTreeMap<AccountId, String>,
    gauge_events: Vec<GaugeEvent>,
    boost_events: Vec<BoostEvent>,
    now: u64,
}

impl Simulation {
    pub fn new(config: &SluiceConfig, scenario: &Scenario) -> Result<Self> {
        let escrow = Arc::new(MemoryEscrow::new());
        let boosts = SharedBoostLedger::new(BoostLedger::new(escrow.clone()));
        let tokens = Arc::new(MemoryTokenLedger::new());
        let weights = Arc::new(MemoryWeights::new());
        let schedule =
            HalvingSchedule::from_config(&config.inflation).context("invalid inflation config")?;

        let gauge_id = AccountId::from_label(&scenario.gauge);
        if scenario.weights.is_empty() {
            weights.set_weight(gauge_id, 0, SCALE);
        }
        for entry in &scenario.weights {
            weights.set_weight(gauge_id, entry.from, entry.weight);
        }
        weights.set_activation(gauge_id, scenario.activation);

        let collab = Collaborators {
            voting: Arc::new(boosts.clone()),
            schedule: Arc::new(schedule),
            weights,
            tokens: tokens.clone(),
        };
        let staking_token = AccountId::from_label(&scenario.staking_token);
        let gauge = Gauge::new(
            gauge_id,
            AccountId::from_label(&scenario.admin),
            staking_token,
            config.gauge.clone(),
            collab,
            scenario.start,
        )
        .context("invalid gauge config")?;

        let mut labels = BTreeMap::new();
        labels.insert(gauge_id, scenario.gauge.clone());
        info!(gauge = %gauge_id.short(), start = scenario.start, "sim: gauge created");
        Ok(Self {
            escrow,
            boosts,
            tokens,
            gauge,
            staking_token,
            managers: BTreeMap::new(),
            labels,
            gauge_events: Vec::new(),
            boost_events: Vec::new(),
            now: scenario.start,
        })
    }

    /// Replay `steps`. With `fail_fast`, the first rejected step aborts the run.
    pub fn run(&mut self, steps: &[Step], fail_fast: bool) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            if step.at < self.now {
                bail!("step {index} at {} precedes the previous step at {}", step.at, self.now);
            }
            self.now = step.at;
            let error = match self.apply(step) {
                Ok(()) => {
                    debug!(index, at = step.at, sender = %step.sender, "sim: step applied");
                    None
                }
                Err(e) => {
                    warn!(index, at = step.at, sender = %step.sender, error = %e, "sim: step rejected");
                    if fail_fast {
                        return Err(e).with_context(|| format!("step {index} rejected"));
                    }
                    Some(e.to_string())
                }
            };
            self.gauge_events.extend(self.gauge.take_events());
            self.boost_events.extend(self.boosts.write().take_events());
            outcomes.push(StepOutcome {
                index,
                at: step.at,
                sender: step.sender.clone(),
                error,
            });
        }
        Ok(outcomes)
    }

    pub fn report(self, steps: Vec<StepOutcome>) -> Report {
        let now = self.now;
        let accounts = self
            .labels
            .iter()
            .map(|(id, label)| {
                let summary = AccountSummary {
                    staked: self.gauge.balance_of(id),
                    working: self.gauge.working_balance_of(id),
                    accumulated: self.gauge.accumulated_fraction(id),
                    voting_power: self.boosts.read().adjusted_balance(id, now),
                };
                (label.clone(), summary)
            })
            .collect();
        let boosts = self.boosts.read().state().clone();
        Report {
            steps,
            accounts,
            gauge: self.gauge.state().clone(),
            boosts,
            gauge_events: self.gauge_events,
            boost_events: self.boost_events,
        }
    }

    fn id(&mut self, label: &str) -> AccountId {
        let id = AccountId::from_label(label);
        self.labels.entry(id).or_insert_with(|| label.to_string());
        id
    }

    fn apply(&mut self, step: &Step) -> Result<(), SluiceError> {
        let ctx = Context::new(self.id(&step.sender), step.at);
        match &step.action {
            Action::Lock { account, amount, weeks } => {
                let account = self.id(account);
                self.escrow
                    .lock(account, *amount, week_start(step.at) + weeks * WEEK);
            }
            Action::Mint { token, account, amount } => {
                let account = self.id(account);
                self.tokens
                    .mint(&AccountId::from_label(token), &account, *amount);
            }
            Action::Deposit { amount, receiver, use_manager } => {
                let receiver = receiver.as_deref().map(|r| self.id(r));
                self.gauge.deposit(&ctx, *amount, receiver, *use_manager)?;
            }
            Action::Withdraw { amount, receiver } => {
                let receiver = receiver.as_deref().map(|r| self.id(r));
                self.gauge.withdraw(&ctx, *amount, receiver)?;
            }
            Action::TransferStake { to, amount } => {
                let to = self.id(to);
                self.gauge.transfer_stake(&ctx, to, *amount)?;
            }
            Action::Checkpoint { account } => {
                let account = self.id(account);
                self.gauge.user_checkpoint(&ctx, account)?;
            }
            Action::Kick { account } => {
                let account = self.id(account);
                self.gauge.kick(&ctx, account)?;
            }
            Action::Boost { receiver, amount, weeks } => {
                let receiver = self.id(receiver);
                let end = week_start(step.at) + weeks * WEEK;
                self.boosts.write().boost(&ctx, receiver, *amount, end)?;
            }
            Action::Unboost { delegator, index, amount } => {
                let delegator = self.id(delegator);
                self.boosts
                    .write()
                    .unboost(&ctx, delegator, *index, *amount)?;
            }
            Action::ToggleVoteSharing { staker } => {
                let staker = self.id(staker);
                self.gauge.toggle_vote_sharing(&ctx, staker)?;
            }
            Action::AcceptSharedVote { owner } => {
                let owner = self.id(owner);
                self.gauge.accept_shared_vote(&ctx, owner)?;
            }
            Action::RejectSharedVote => {
                self.gauge.reject_shared_vote(&ctx)?;
            }
            Action::RegisterRewardToken { token, distributor, period_length } => {
                let token = self.id(token);
                let distributor = self.id(distributor);
                self.gauge
                    .register_reward_token(&ctx, token, distributor, *period_length)?;
            }
            Action::UnregisterRewardToken { token } => {
                let token = self.id(token);
                self.gauge.unregister_reward_token(&ctx, token)?;
            }
            Action::SetRewardDistributor { token, distributor } => {
                let token = self.id(token);
                let distributor = self.id(distributor);
                self.gauge.set_reward_distributor(&ctx, token, distributor)?;
            }
            Action::DepositReward { token, amount } => {
                let token = self.id(token);
                self.gauge.deposit_reward(&ctx, token, *amount)?;
            }
            Action::Claim { account, to } => {
                let account = account.as_deref().map(|a| self.id(a));
                let to = to.as_deref().map(|t| self.id(t));
                self.gauge.claim(&ctx, account, to)?;
            }
            Action::ClaimHistorical { account, to, tokens } => {
                let account = account.as_deref().map(|a| self.id(a));
                let to = to.as_deref().map(|t| self.id(t));
                let tokens: Vec<TokenId> = tokens.iter().map(|t| self.id(t)).collect();
                self.gauge.claim_historical(&ctx, account, to, &tokens)?;
            }
            Action::SetRewardsReceiver { receiver } => {
                let receiver = receiver.as_deref().map(|r| self.id(r));
                self.gauge.set_rewards_receiver(&ctx, receiver)?;
            }
            Action::DisableGauge => self.gauge.disable_gauge(&ctx)?,
            Action::SetLiquidityManager { address } => {
                let manager = match address {
                    Some(label) => {
                        let address = self.id(label);
                        let token = self.staking_token;
                        let manager = self
                            .managers
                            .entry(label.clone())
                            .or_insert_with(|| Arc::new(HoldingManager::new(address, token)))
                            .clone();
                        Some(manager as Arc<dyn LiquidityManager>)
                    }
                    None => None,
                };
                self.gauge.set_liquidity_manager(&ctx, manager)?;
            }
            Action::DeactivateManager { address } => {
                if let Some(manager) = self.managers.get(address) {
                    manager.set_active(false);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::constants::UNIT;

    const BASIC: &str = include_str!("../scenarios/basic.json");

    fn run(json: &str, fail_fast: bool) -> Result<Report> {
        let scenario: Scenario = serde_json::from_str(json)?;
        let mut sim = Simulation::new(&SluiceConfig::default(), &scenario)?;
        let outcomes = sim.run(&scenario.steps, fail_fast)?;
        Ok(sim.report(outcomes))
    }

    #[test]
    fn basic_scenario_replays() {
        let report = run(BASIC, true).unwrap();
        assert!(report.steps.iter().all(|s| s.error.is_none()));
        let alice = &report.accounts["alice"];
        assert_eq!(alice.staked, 100 * UNIT);
        assert!(alice.working > 40 * UNIT);
        assert!(alice.accumulated > 0);
        assert!(report.gauge_events.iter().any(|e| matches!(e, GaugeEvent::Deposit { .. })));
        assert!(report.boost_events.iter().any(|e| matches!(e, BoostEvent::Boost { .. })));
    }

    #[test]
    fn rejected_step_is_recorded() {
        let json = r#"{
            "start": 604800,
            "steps": [
                { "at": 604800, "sender": "alice", "action": { "deposit": { "amount": 0 } } }
            ]
        }"#;
        let report = run(json, false).unwrap();
        assert_eq!(report.steps[0].error.as_deref(), Some("deposit amount is zero"));
        assert!(run(json, true).is_err());
    }

    #[test]
    fn steps_must_not_go_back_in_time() {
        let json = r#"{
            "start": 604800,
            "steps": [
                { "at": 604700, "action": "disable_gauge" }
            ]
        }"#;
        assert!(run(json, false).is_err());
    }

    #[test]
    fn unregistered_token_stays_claimable() {
        let json = r#"{
            "start": 604800,
            "steps": [
                { "at": 604800, "action": { "mint": { "token": "lp", "account": "alice", "amount": 1000 } } },
                { "at": 604800, "action": { "mint": { "token": "bonus", "account": "admin", "amount": 5000 } } },
                { "at": 604800, "sender": "alice", "action": { "deposit": { "amount": 1000 } } },
                { "at": 604800, "action": { "register_reward_token": { "token": "bonus", "distributor": "admin", "period_length": 0 } } },
                { "at": 604800, "action": { "deposit_reward": { "token": "bonus", "amount": 5000 } } },
                { "at": 604900, "action": { "unregister_reward_token": { "token": "bonus" } } },
                { "at": 605000, "sender": "alice", "action": { "claim_historical": { "tokens": ["bonus"] } } }
            ]
        }"#;
        let report = run(json, true).unwrap();
        assert!(report.gauge_events.iter().any(|e| matches!(
            e,
            GaugeEvent::Claim { amount: 5000, .. }
        )));
    }

    #[test]
    fn report_serializes() {
        let report = run(BASIC, true).unwrap();
        let text = serde_json::to_string(&report).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json["accounts"]["alice"]["staked"].is_number());
        assert!(json["gauge"]["accounts"].is_object());
    }
}
