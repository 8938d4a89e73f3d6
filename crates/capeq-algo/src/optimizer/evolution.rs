//! Differential-evolution best response.
//!
//! Classic `DE/best/1/bin` over the unit hypercube mapped onto the feasible
//! box:
//!
//! ```text
//! population  P = popsize · dims members, Latin-hypercube initialized
//! mutant      v = p_best + F · (p_r0 − p_r1)           r0 ≠ r1 ≠ i
//! crossover   u_j = v_j  if rand < CR or j = j_rand,  else p_i,j
//! repair      u_j ∉ [0, 1]  →  u_j ~ U(0, 1)
//! selection   p_i ← u  if f(u) ≤ f(p_i)
//! stop        std(f(P)) ≤ atol + tol · |mean(f(P))|   or generation budget
//! ```
//!
//! Trial vectors of one generation are built from the same parent population
//! and evaluated together, in parallel when the `parallel` feature is on.
//! Selection happens afterwards in population order, so the outcome for a
//! fixed seed does not depend on thread scheduling.
//!
//! The search is repeated `restarts` times from independent populations.
//! Net costs of the restarts are negated and the restart with the largest
//! negated value wins; that negated value (the agent's predicted profit) is
//! the reported objective.

use capeq_core::CapeqResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AgentDecision, AgentProblem, BestResponse};
use crate::interrupt::Interrupt;
use crate::region::FeasibleRegion;

/// Differential-evolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Population members per search dimension
    pub popsize: usize,
    /// Differential weight F
    pub mutation: f64,
    /// Crossover probability CR
    pub recombination: f64,
    /// Generation budget per restart
    pub max_generations: usize,
    /// Relative convergence tolerance on population energies
    pub tol: f64,
    /// Absolute convergence tolerance on population energies
    pub atol: f64,
    /// Independent restarts per best response
    pub restarts: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            popsize: 100,
            mutation: 0.5,
            recombination: 0.9,
            max_generations: 1000,
            tol: 0.01,
            atol: 0.0,
            restarts: 5,
        }
    }
}

/// Multi-start differential-evolution strategy.
#[derive(Debug, Clone, Default)]
pub struct EvolutionarySearch {
    pub config: EvolutionConfig,
}

impl EvolutionarySearch {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }
}

/// Outcome of a single differential-evolution run.
#[derive(Debug, Clone)]
struct Outcome {
    x: Vec<f64>,
    fun: f64,
    converged: bool,
    evaluations: usize,
}

impl BestResponse for EvolutionarySearch {
    fn id(&self) -> &str {
        "evolutionary"
    }

    fn optimize(
        &self,
        problem: &AgentProblem<'_>,
        interrupt: &Interrupt,
    ) -> CapeqResult<AgentDecision> {
        let region = FeasibleRegion::global_search(&problem.region_inputs())?;
        debug!(
            agent = problem.agent,
            lower = ?region.lower,
            upper = ?region.upper,
            "evolutionary search bounds"
        );

        let x_other = problem.capacity.others_total(problem.agent);
        let objective = problem.objective(&x_other);
        let f = |x: &[f64]| objective.value(x);

        let restarts = self.config.restarts.max(1);
        let mut outcomes = Vec::with_capacity(restarts);
        for restart in 0..restarts {
            problem.check_interrupt(interrupt)?;
            let mut rng = problem.rng(restart);
            outcomes.push(run_once(&f, &region, &self.config, &mut rng, || {
                problem.check_interrupt(interrupt)
            })?);
        }

        let evaluations = outcomes.iter().map(|o| o.evaluations).sum();

        // Largest negated net cost wins; first restart wins ties
        let mut best = 0;
        for (k, outcome) in outcomes.iter().enumerate() {
            if -outcome.fun > -outcomes[best].fun {
                best = k;
            }
        }
        let best = &outcomes[best];

        debug!(agent = problem.agent, xopt = ?best.x, fopt = -best.fun, "evolutionary optimum");

        Ok(AgentDecision {
            decision: best.x.clone(),
            objective: -best.fun,
            converged: best.converged,
            evaluations,
            saturated: region.saturated.clone(),
        })
    }
}

fn run_once<F, C>(
    f: &F,
    region: &FeasibleRegion,
    config: &EvolutionConfig,
    rng: &mut StdRng,
    check: C,
) -> CapeqResult<Outcome>
where
    F: Fn(&[f64]) -> CapeqResult<f64> + Sync,
    C: Fn() -> CapeqResult<()>,
{
    let dims = region.dims();

    // Zero-width box: nothing to search
    if region.is_point() {
        let x = region.lower.clone();
        let fun = f(&x)?;
        return Ok(Outcome {
            x,
            fun,
            converged: true,
            evaluations: 1,
        });
    }

    let num_pop = (config.popsize * dims).max(5);
    let to_box = |unit: &[f64]| -> Vec<f64> {
        unit.iter()
            .enumerate()
            .map(|(j, u)| region.lower[j] + u * region.width(j))
            .collect()
    };

    let mut population = latin_hypercube(num_pop, dims, rng);
    let mut energies = evaluate(f, &population, &to_box)?;
    let mut evaluations = num_pop;

    // Keep the best member at index 0
    let mut best = argmin(&energies);
    population.swap(0, best);
    energies.swap(0, best);
    best = 0;

    let mut converged = false;
    for _generation in 0..config.max_generations {
        check()?;

        let trials: Vec<Vec<f64>> = (0..num_pop)
            .map(|i| trial_vector(i, best, &population, config, rng))
            .collect();
        let trial_energies = evaluate(f, &trials, &to_box)?;
        evaluations += num_pop;

        for (i, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
            if energy <= energies[i] {
                population[i] = trial;
                energies[i] = energy;
                if energy < energies[best] {
                    best = i;
                }
            }
        }

        if population_converged(&energies, config) {
            converged = true;
            break;
        }
    }

    Ok(Outcome {
        x: to_box(&population[best]),
        fun: energies[best],
        converged,
        evaluations,
    })
}

/// `DE/best/1/bin` trial vector for member `i`, in unit coordinates.
fn trial_vector(
    i: usize,
    best: usize,
    population: &[Vec<f64>],
    config: &EvolutionConfig,
    rng: &mut StdRng,
) -> Vec<f64> {
    let num_pop = population.len();
    let dims = population[i].len();

    let r0 = pick_excluding(rng, num_pop, &[i]);
    let r1 = pick_excluding(rng, num_pop, &[i, r0]);

    let mut trial = population[i].clone();
    let fill_point = rng.gen_range(0..dims);
    for j in 0..dims {
        if j == fill_point || rng.gen::<f64>() < config.recombination {
            trial[j] =
                population[best][j] + config.mutation * (population[r0][j] - population[r1][j]);
        }
    }

    for value in trial.iter_mut() {
        if !(0.0..=1.0).contains(value) {
            *value = rng.gen::<f64>();
        }
    }
    trial
}

fn pick_excluding(rng: &mut StdRng, n: usize, exclude: &[usize]) -> usize {
    loop {
        let k = rng.gen_range(0..n);
        if !exclude.contains(&k) {
            return k;
        }
    }
}

/// Latin-hypercube sample of `n` points in `[0, 1]^dims`.
fn latin_hypercube(n: usize, dims: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let segment = 1.0 / n as f64;
    let mut population = vec![vec![0.0; dims]; n];
    for j in 0..dims {
        let mut column: Vec<f64> = (0..n)
            .map(|k| (k as f64 + rng.gen::<f64>()) * segment)
            .collect();
        column.shuffle(rng);
        for (member, value) in population.iter_mut().zip(column) {
            member[j] = value;
        }
    }
    population
}

fn evaluate<F, M>(f: &F, members: &[Vec<f64>], to_box: &M) -> CapeqResult<Vec<f64>>
where
    F: Fn(&[f64]) -> CapeqResult<f64> + Sync,
    M: Fn(&[f64]) -> Vec<f64> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        members.par_iter().map(|unit| f(&to_box(unit))).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        members.iter().map(|unit| f(&to_box(unit))).collect()
    }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (k, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = k;
        }
    }
    best
}

fn population_converged(energies: &[f64], config: &EvolutionConfig) -> bool {
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let var = energies.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / n;
    var.sqrt() <= config.atol + config.tol * mean.abs()
}
