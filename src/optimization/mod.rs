use std::sync::Mutex;
use std::time::Duration;
#[cfg(feature = "nlopt_optimization")]
use std::time::Instant;
use nalgebra::DVector;
use serde::{Serialize, Deserialize};
use optimization_engine::{constraints, Optimizer, Problem, SolverError};
use optimization_engine::alm::{AlmCache, AlmFactory, AlmOptimizer, AlmProblem, NO_JACOBIAN_MAPPING, NO_MAPPING, NO_SET};
use optimization_engine::core::ExitStatus;
use optimization_engine::panoc::{PANOCCache, PANOCOptimizer};
use crate::utils::utils_errors::MotionOptError;
use crate::utils::utils_math::FiniteDifferenceUtils;
use crate::utils::utils_nalgebra::NalgebraConversions;
#[cfg(feature = "nlopt_optimization")]
use nlopt::*;

/// A scalar-valued function of the optimization variables, evaluated against
/// a shared context object `C` (for this toolbox, the evaluation context that
/// owns the dynamics engine and the motion curve).  Implementations keep any
/// call counters as interior-mutable fields; the solver backends hand the
/// function out behind shared references.
pub trait ScalarFunction<C> {
    fn eval(&self, x: &[f64], ctx: &mut C) -> f64;
}

/// Weighted sum of scalar functions.  Used as the objective container and, on
/// the OpEn backend, as the combined constraint function.
pub struct WeightedScalarSum<C> {
    terms: Vec<(f64, Box<dyn ScalarFunction<C>>)>
}
impl<C> WeightedScalarSum<C> {
    pub fn new() -> Self {
        Self { terms: vec![] }
    }
    pub fn add_function<F: ScalarFunction<C> + 'static>(&mut self, f: F, weight: Option<f64>) {
        self.add_boxed_function(Box::new(f), weight);
    }
    pub fn add_boxed_function(&mut self, f: Box<dyn ScalarFunction<C>>, weight: Option<f64>) {
        self.terms.push((weight.unwrap_or(1.0), f));
    }
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }
}
impl<C> ScalarFunction<C> for WeightedScalarSum<C> {
    fn eval(&self, x: &[f64], ctx: &mut C) -> f64 {
        let mut out_sum = 0.0;
        for (weight, f) in &self.terms {
            out_sum += weight * f.eval(x, ctx);
        }
        out_sum
    }
}

/// Clamps a less-than-zero inequality residual so that satisfied constraints
/// contribute nothing to the combined constraint function.
pub struct MaxZero<C> {
    f: Box<dyn ScalarFunction<C>>
}
impl<C> MaxZero<C> {
    pub fn new(f: Box<dyn ScalarFunction<C>>) -> Self {
        Self { f }
    }
}
impl<C> ScalarFunction<C> for MaxZero<C> {
    fn eval(&self, x: &[f64], ctx: &mut C) -> f64 {
        self.f.eval(x, ctx).max(0.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

pub enum NonlinearOptimizer<C> {
    OpEn(OpEnNonlinearOptimizer<C>),
    #[cfg(feature = "nlopt_optimization")]
    Nlopt(NLoptNonlinearOptimizer<C>)
}
impl<C: 'static> NonlinearOptimizer<C> {
    pub fn new(problem_size: usize, t: NonlinearOptimizerType) -> Self {
        return match t {
            NonlinearOptimizerType::OpEn => { Self::OpEn(OpEnNonlinearOptimizer::new(problem_size)) }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizerType::NloptCobyla => { Self::Nlopt(NLoptNonlinearOptimizer::new(problem_size, NloptAlgorithmWrapper::COBYLA)) }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizerType::NloptBobyqa => { Self::Nlopt(NLoptNonlinearOptimizer::new(problem_size, NloptAlgorithmWrapper::BOBYQA)) }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizerType::NloptSlsqp => { Self::Nlopt(NLoptNonlinearOptimizer::new(problem_size, NloptAlgorithmWrapper::SLSQP)) }
        }
    }
    pub fn add_cost_term<F: ScalarFunction<C> + 'static>(&mut self, f: F, weight: Option<f64>) {
        match self {
            NonlinearOptimizer::OpEn(n) => { n.add_cost_term(f, weight); }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.add_cost_term(f, weight); }
        }
    }
    pub fn add_equality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        match self {
            NonlinearOptimizer::OpEn(n) => { n.add_equality_constraint(f); }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.add_equality_constraint(f); }
        }
    }
    pub fn add_less_than_zero_inequality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        match self {
            NonlinearOptimizer::OpEn(n) => { n.add_less_than_zero_inequality_constraint(f); }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.add_less_than_zero_inequality_constraint(f); }
        }
    }
    pub fn set_bounds(&mut self, bounds: Vec<(f64, f64)>) {
        match self {
            NonlinearOptimizer::OpEn(n) => { n.set_bounds(bounds); }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.set_bounds(bounds); }
        }
    }
    pub fn optimize(&mut self, init_condition: &DVector<f64>, ctx: &mut C, parameters: &OptimizerParameters) -> Result<OptimizerResult, MotionOptError> {
        return match self {
            NonlinearOptimizer::OpEn(n) => { n.optimize(init_condition, ctx, parameters) }
            #[cfg(feature = "nlopt_optimization")]
            NonlinearOptimizer::Nlopt(n) => { n.optimize(init_condition, ctx, parameters) }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NonlinearOptimizerType {
    OpEn,
    #[cfg(feature = "nlopt_optimization")]
    NloptCobyla,
    #[cfg(feature = "nlopt_optimization")]
    NloptBobyqa,
    #[cfg(feature = "nlopt_optimization")]
    NloptSlsqp
}
impl Default for NonlinearOptimizerType {
    fn default() -> Self {
        Self::OpEn
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// OpEn (Optimization Engine) backend.  PANOC when the problem is
/// unconstrained, ALM with a combined penalty constraint otherwise.  The
/// objective carries no analytic derivative here, so gradients come from
/// central finite differences over the cost function.
pub struct OpEnNonlinearOptimizer<C> {
    cost_function: WeightedScalarSum<C>,
    constraint_function: Option<WeightedScalarSum<C>>,
    problem_size: usize,
    bounds: (Vec<f64>, Vec<f64>)
}
impl<C: 'static> OpEnNonlinearOptimizer<C> {
    pub fn new(problem_size: usize) -> Self {
        let mut lower_bounds = vec![];
        let mut upper_bounds = vec![];
        for _ in 0..problem_size { lower_bounds.push(-f64::INFINITY); upper_bounds.push(f64::INFINITY); }
        Self {
            cost_function: WeightedScalarSum::new(),
            constraint_function: None,
            problem_size,
            bounds: (lower_bounds, upper_bounds)
        }
    }
    pub fn add_cost_term<F: ScalarFunction<C> + 'static>(&mut self, f: F, weight: Option<f64>) {
        self.cost_function.add_function(f, weight);
    }
    pub fn add_equality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        if self.constraint_function.is_none() {
            self.constraint_function = Some(WeightedScalarSum::new());
        }

        self.constraint_function.as_mut().unwrap().add_function(f, None);
    }
    pub fn add_less_than_zero_inequality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        if self.constraint_function.is_none() {
            self.constraint_function = Some(WeightedScalarSum::new());
        }

        let wrapped_f = MaxZero::new(Box::new(f));

        self.constraint_function.as_mut().unwrap().add_function(wrapped_f, None);
    }
    pub fn set_bounds(&mut self, bounds: Vec<(f64, f64)>) {
        assert_eq!(self.problem_size, bounds.len());
        let mut lower_bounds = vec![];
        let mut upper_bounds = vec![];
        for b in bounds {
            lower_bounds.push(b.0);
            upper_bounds.push(b.1);
        }
        self.bounds = (lower_bounds, upper_bounds);
    }
    pub fn optimize(&mut self, init_condition: &DVector<f64>, ctx: &mut C, parameters: &OptimizerParameters) -> Result<OptimizerResult, MotionOptError> {
        return match self.constraint_function {
            None => { self.optimize_panoc(init_condition, ctx, parameters) }
            Some(_) => { self.optimize_alm(init_condition, ctx, parameters) }
        }
    }
    fn optimize_panoc(&self, init_condition: &DVector<f64>, ctx: &mut C, parameters: &OptimizerParameters) -> Result<OptimizerResult, MotionOptError> {
        let mut panoc_cache = PANOCCache::new(self.problem_size, 1e-5, 3);

        let ctx_mutex = Mutex::new(ctx);
        let fd_step = parameters.finite_difference_step;

        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            let mut ctx_guard = ctx_mutex.lock().unwrap();
            let ctx: &mut C = &mut **ctx_guard;
            let g = FiniteDifferenceUtils::central_difference_gradient(|x| self.cost_function.eval(x, &mut *ctx), u, fd_step);
            for (i, v) in g.iter().enumerate() {
                grad[i] = *v;
            }
            Ok(())
        };
        let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            let mut ctx_guard = ctx_mutex.lock().unwrap();
            let ctx: &mut C = &mut **ctx_guard;
            *cost = self.cost_function.eval(u, ctx);
            Ok(())
        };

        let bounds = constraints::Rectangle::new(Some(&self.bounds.0), Some(&self.bounds.1));

        let problem = Problem::new(&bounds, df, f);

        let mut panoc = PANOCOptimizer::new(problem, &mut panoc_cache);
        if let Some(a) = &parameters.max_time { panoc = panoc.with_max_duration(a.clone()); }
        panoc = panoc.with_max_iter(parameters.max_evaluations);
        panoc = panoc.with_tolerance(parameters.open_tolerance);

        let mut u = NalgebraConversions::dvector_to_vec(init_condition);
        let status = panoc.solve(&mut u)
            .map_err(|e| MotionOptError::new_generic_error_str(&format!("OpEn PANOC solver error: {:?}", e), file!(), line!()))?;

        let open_result = OpEnResult {
            x_min: DVector::from_vec(u),
            exit_status: status.exit_status(),
            num_outer_iterations: 0,
            num_inner_iterations: status.iterations(),
            cost: status.cost_value()
        };

        return Ok(OptimizerResult::OpEn(open_result));
    }
    fn optimize_alm(&self, init_condition: &DVector<f64>, ctx: &mut C, parameters: &OptimizerParameters) -> Result<OptimizerResult, MotionOptError> {
        let panoc_cache = PANOCCache::new(self.problem_size, 1e-5, 3);
        let mut alm_cache = AlmCache::new(panoc_cache, 0, 1);

        let ctx_mutex = Mutex::new(ctx);
        let fd_step = parameters.finite_difference_step;

        let bounds = constraints::Rectangle::new(Some(&self.bounds.0), Some(&self.bounds.1));

        let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            let mut ctx_guard = ctx_mutex.lock().unwrap();
            let ctx: &mut C = &mut **ctx_guard;
            let g = FiniteDifferenceUtils::central_difference_gradient(|x| self.cost_function.eval(x, &mut *ctx), u, fd_step);
            for (i, v) in g.iter().enumerate() {
                grad[i] = *v;
            }
            Ok(())
        };
        let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            let mut ctx_guard = ctx_mutex.lock().unwrap();
            let ctx: &mut C = &mut **ctx_guard;
            *cost = self.cost_function.eval(u, ctx);
            Ok(())
        };
        let f2 = |u: &[f64], f2u: &mut [f64]| -> Result<(), SolverError> {
            if let Some(constraint_function) = &self.constraint_function {
                let mut ctx_guard = ctx_mutex.lock().unwrap();
                let ctx: &mut C = &mut **ctx_guard;
                f2u[0] = constraint_function.eval(u, ctx);
            }
            Ok(())
        };
        let f2_jacobian_product = |u: &[f64], d: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
            if let Some(constraint_function) = &self.constraint_function {
                let mut ctx_guard = ctx_mutex.lock().unwrap();
                let ctx: &mut C = &mut **ctx_guard;
                let g = FiniteDifferenceUtils::central_difference_gradient(|x| constraint_function.eval(x, &mut *ctx), u, fd_step);
                for (i, v) in g.iter().enumerate() {
                    res[i] = *v * d[0];
                }
            }
            Ok(())
        };

        let factory = AlmFactory::new(
            f,
            df,
            NO_MAPPING,
            NO_JACOBIAN_MAPPING,
            Some(f2),
            Some(f2_jacobian_product),
            NO_SET,
            1,
        );

        let alm_problem = AlmProblem::new(
            bounds,
            NO_SET,
            NO_SET,
            |u: &[f64], xi: &[f64], cost: &mut f64| -> Result<(), SolverError> {
                factory.psi(u, xi, cost)
            },
            |u: &[f64], xi: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
                factory.d_psi(u, xi, grad)
            },
            NO_MAPPING,
            Some(f2),
            0,
            1
        );

        let mut alm_optimizer = AlmOptimizer::new(&mut alm_cache, alm_problem);
        if let Some(a) = &parameters.max_time { alm_optimizer = alm_optimizer.with_max_duration(a.clone()); }
        alm_optimizer = alm_optimizer.with_max_inner_iterations(parameters.max_evaluations);
        alm_optimizer = alm_optimizer.with_max_outer_iterations(parameters.max_outer_iterations);

        let mut u = NalgebraConversions::dvector_to_vec(init_condition);
        let r = alm_optimizer.solve(&mut u)
            .map_err(|e| MotionOptError::new_generic_error_str(&format!("OpEn ALM solver error: {:?}", e), file!(), line!()))?;

        let open_result = OpEnResult {
            x_min: DVector::from_vec(u),
            exit_status: r.exit_status(),
            num_outer_iterations: r.num_outer_iterations(),
            num_inner_iterations: r.num_inner_iterations(),
            cost: r.cost()
        };

        return Ok(OptimizerResult::OpEn(open_result));
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(feature = "nlopt_optimization")]
#[derive(Clone, Debug)]
pub enum NloptAlgorithmWrapper {
    /// Local, non-derivative
    COBYLA,
    /// Local, non-derivative
    BOBYQA,
    /// Local, derivative
    SLSQP
}
#[cfg(feature = "nlopt_optimization")]
impl NloptAlgorithmWrapper {
    fn map_to_algorithm(&self) -> Algorithm {
        match self {
            NloptAlgorithmWrapper::COBYLA => { Algorithm::Cobyla }
            NloptAlgorithmWrapper::BOBYQA => { Algorithm::Bobyqa }
            NloptAlgorithmWrapper::SLSQP => { Algorithm::Slsqp }
        }
    }
    fn handles_equality_constraints(&self) -> bool {
        match self {
            NloptAlgorithmWrapper::COBYLA => { false }
            NloptAlgorithmWrapper::BOBYQA => { false }
            NloptAlgorithmWrapper::SLSQP => { true }
        }
    }
    fn handles_inequality_constraints(&self) -> bool {
        match self {
            NloptAlgorithmWrapper::COBYLA => { true }
            NloptAlgorithmWrapper::BOBYQA => { false }
            NloptAlgorithmWrapper::SLSQP => { true }
        }
    }
}

/// NLopt backend.  Derivative-free direct search by default (COBYLA, the
/// classic choice for simulation-in-the-loop objectives).  Algorithms without
/// native equality or inequality support receive those residuals folded into
/// the objective as fixed-weight penalties.
#[cfg(feature = "nlopt_optimization")]
pub struct NLoptNonlinearOptimizer<C> {
    algorithm: NloptAlgorithmWrapper,
    cost_function: WeightedScalarSum<C>,
    equality_constraints: Vec<Box<dyn ScalarFunction<C>>>,
    inequality_constraints: Vec<Box<dyn ScalarFunction<C>>>,
    problem_size: usize,
    bounds: Option<(Vec<f64>, Vec<f64>)>
}
#[cfg(feature = "nlopt_optimization")]
impl<C> NLoptNonlinearOptimizer<C> {
    pub fn new(problem_size: usize, algorithm: NloptAlgorithmWrapper) -> Self {
        Self {
            algorithm,
            cost_function: WeightedScalarSum::new(),
            equality_constraints: vec![],
            inequality_constraints: vec![],
            problem_size,
            bounds: None
        }
    }
    pub fn add_cost_term<F: ScalarFunction<C> + 'static>(&mut self, f: F, weight: Option<f64>) {
        self.cost_function.add_function(f, weight);
    }
    pub fn add_equality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        self.equality_constraints.push(Box::new(f));
    }
    pub fn add_less_than_zero_inequality_constraint<F: ScalarFunction<C> + 'static>(&mut self, f: F) {
        self.inequality_constraints.push(Box::new(f));
    }
    pub fn set_bounds(&mut self, bounds: Vec<(f64, f64)>) {
        assert_eq!(self.problem_size, bounds.len());
        let mut lower_bounds = vec![];
        let mut upper_bounds = vec![];
        for b in bounds {
            lower_bounds.push(b.0);
            upper_bounds.push(b.1);
        }
        self.bounds = Some((lower_bounds, upper_bounds));
    }
    pub fn optimize(&mut self, init_condition: &DVector<f64>, ctx: &mut C, parameters: &OptimizerParameters) -> Result<OptimizerResult, MotionOptError> {
        let start = Instant::now();
        let ctx_mutex = Mutex::new(ctx);
        let eq_penalty_weight = parameters.eq_penalty_weight;
        let fold_equalities = !self.algorithm.handles_equality_constraints();
        let fold_inequalities = !self.algorithm.handles_inequality_constraints();

        let obj_f = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
            let mut ctx_guard = ctx_mutex.lock().unwrap();
            let ctx: &mut C = &mut **ctx_guard;
            let mut val = self.cost_function.eval(x, ctx);
            if fold_equalities {
                for c in &self.equality_constraints { val += eq_penalty_weight * c.eval(x, ctx); }
            }
            if fold_inequalities {
                for c in &self.inequality_constraints { val += eq_penalty_weight * c.eval(x, ctx).max(0.0); }
            }
            val
        };
        let mut nlopt = Nlopt::new(self.algorithm.map_to_algorithm(), self.problem_size, obj_f, Target::Minimize, ());

        if !fold_equalities {
            for c in &self.equality_constraints {
                let eq_con = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                    let mut ctx_guard = ctx_mutex.lock().unwrap();
                    let ctx: &mut C = &mut **ctx_guard;
                    c.eval(x, ctx)
                };
                nlopt.add_equality_constraint(eq_con, (), 1e-6)
                    .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not add equality constraint: {:?}", e), file!(), line!()))?;
            }
        }
        if !fold_inequalities {
            for c in &self.inequality_constraints {
                let ineq_con = |x: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                    let mut ctx_guard = ctx_mutex.lock().unwrap();
                    let ctx: &mut C = &mut **ctx_guard;
                    c.eval(x, ctx)
                };
                nlopt.add_inequality_constraint(ineq_con, (), 1e-6)
                    .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not add inequality constraint: {:?}", e), file!(), line!()))?;
            }
        }

        if let Some(bounds) = &self.bounds {
            nlopt.set_lower_bounds(&bounds.0)
                .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not set lower bounds: {:?}", e), file!(), line!()))?;
            nlopt.set_upper_bounds(&bounds.1)
                .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not set upper bounds: {:?}", e), file!(), line!()))?;
        }
        if let Some(a) = &parameters.max_time {
            nlopt.set_maxtime(a.as_secs_f64())
                .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not set max time: {:?}", e), file!(), line!()))?;
        }
        nlopt.set_maxeval(parameters.max_evaluations as u32)
            .map_err(|e| MotionOptError::new_generic_error_str(&format!("could not set max evaluations: {:?}", e), file!(), line!()))?;

        let mut x = NalgebraConversions::dvector_to_vec(init_condition);
        let res = nlopt.optimize(&mut x);
        match res {
            Ok(r) => {
                let output = NloptResult {
                    x_min: DVector::from_vec(x),
                    solve_time: start.elapsed(),
                    cost: r.1
                };
                return Ok(OptimizerResult::Nlopt(output));
            }
            Err(e) => {
                return Err(MotionOptError::new_generic_error_str(&format!("NLopt optimization failed: {:?}", e), file!(), line!()));
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug)]
pub enum OptimizerResult {
    OpEn(OpEnResult),
    #[cfg(feature = "nlopt_optimization")]
    Nlopt(NloptResult)
}
impl OptimizerResult {
    pub fn x_min(&self) -> &DVector<f64> {
        return match self {
            OptimizerResult::OpEn(r) => { r.x_min() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(r) => { r.x_min() }
        }
    }
    pub fn cost(&self) -> f64 {
        return match self {
            OptimizerResult::OpEn(r) => { r.cost() }
            #[cfg(feature = "nlopt_optimization")]
            OptimizerResult::Nlopt(r) => { r.cost() }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpEnResult {
    x_min: DVector<f64>,
    exit_status: ExitStatus,
    num_outer_iterations: usize,
    num_inner_iterations: usize,
    cost: f64
}
impl OpEnResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }
    pub fn num_outer_iterations(&self) -> usize {
        self.num_outer_iterations
    }
    pub fn num_inner_iterations(&self) -> usize {
        self.num_inner_iterations
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[cfg(feature = "nlopt_optimization")]
#[derive(Clone, Debug)]
pub struct NloptResult {
    x_min: DVector<f64>,
    solve_time: Duration,
    cost: f64
}
#[cfg(feature = "nlopt_optimization")]
impl NloptResult {
    pub fn x_min(&self) -> &DVector<f64> {
        &self.x_min
    }
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[derive(Clone, Debug)]
pub struct OptimizerParameters {
    /// Evaluation budget handed to the backend; the dominant terminator for
    /// full-rollout objectives.
    pub max_evaluations: usize,
    /// Outer (penalty-update) iteration cap for the ALM path.
    pub max_outer_iterations: usize,
    pub max_time: Option<Duration>,
    pub open_tolerance: f64,
    pub finite_difference_step: f64,
    /// Fixed weight for constraint residuals folded into the objective on
    /// backends without native constraint support.
    pub eq_penalty_weight: f64
}
impl Default for OptimizerParameters {
    fn default() -> Self {
        Self {
            max_evaluations: 1000,
            max_outer_iterations: 10,
            max_time: None,
            open_tolerance: 1e-4,
            finite_difference_step: 1e-6,
            eq_penalty_weight: 1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        center: Vec<f64>
    }
    impl ScalarFunction<()> for Quadratic {
        fn eval(&self, x: &[f64], _ctx: &mut ()) -> f64 {
            x.iter().zip(self.center.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
        }
    }

    struct DistanceFromOne;
    impl ScalarFunction<()> for DistanceFromOne {
        fn eval(&self, x: &[f64], _ctx: &mut ()) -> f64 {
            (x[0] - 1.0).abs()
        }
    }

    #[test]
    fn weighted_scalar_sum_combines_terms() {
        let mut sum = WeightedScalarSum::new();
        sum.add_function(Quadratic { center: vec![0.0, 0.0] }, None);
        sum.add_function(Quadratic { center: vec![1.0, 1.0] }, Some(2.0));
        let value = sum.eval(&[1.0, 1.0], &mut ());
        assert_eq!(value, 2.0);
    }

    #[test]
    fn max_zero_clamps_satisfied_constraints() {
        let f = MaxZero::new(Box::new(DistanceFromOne));
        assert_eq!(f.eval(&[1.0], &mut ()), 0.0);
        assert!(f.eval(&[3.0], &mut ()) > 0.0);
    }

    #[test]
    fn panoc_minimizes_a_bound_constrained_quadratic() {
        let mut n: NonlinearOptimizer<()> = NonlinearOptimizer::new(2, NonlinearOptimizerType::OpEn);
        n.add_cost_term(Quadratic { center: vec![1.5, -0.5] }, None);
        n.set_bounds(vec![(-2.0, 2.0), (-2.0, 2.0)]);

        let init = DVector::from_vec(vec![0.0, 0.0]);
        let result = n.optimize(&init, &mut (), &OptimizerParameters::default()).unwrap();

        let x_min = result.x_min();
        assert!((x_min[0] - 1.5).abs() < 1e-2);
        assert!((x_min[1] + 0.5).abs() < 1e-2);
        assert!(result.cost() < 1e-3);
    }

    #[test]
    fn panoc_respects_bounds() {
        let mut n: NonlinearOptimizer<()> = NonlinearOptimizer::new(1, NonlinearOptimizerType::OpEn);
        n.add_cost_term(Quadratic { center: vec![5.0] }, None);
        n.set_bounds(vec![(-1.0, 1.0)]);

        let init = DVector::from_vec(vec![0.0]);
        let result = n.optimize(&init, &mut (), &OptimizerParameters::default()).unwrap();
        assert!(result.x_min()[0] <= 1.0 + 1e-9);
        assert!((result.x_min()[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn alm_drives_an_equality_constraint_toward_zero() {
        let mut n: NonlinearOptimizer<()> = NonlinearOptimizer::new(1, NonlinearOptimizerType::OpEn);
        n.add_cost_term(Quadratic { center: vec![0.0] }, None);
        n.add_equality_constraint(DistanceFromOne);
        n.set_bounds(vec![(-2.0, 2.0)]);

        let init = DVector::from_vec(vec![-0.5]);
        let result = n.optimize(&init, &mut (), &OptimizerParameters::default()).unwrap();

        // without the constraint the minimum is x = 0; the constraint pulls
        // the solution to the vicinity of x = 1
        assert!((result.x_min()[0] - 1.0).abs() < 0.1);
    }
}
