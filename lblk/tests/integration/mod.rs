// vim: tw=80
mod util;
use util::*;

mod lblk;
