extern crate lysander;

fn main() {
    lysander::engine::run();
}
