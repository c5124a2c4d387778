mod test_best_fit_basic;
mod test_evaluator_basic;
mod test_implicit_basic;
