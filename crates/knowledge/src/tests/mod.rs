//! Pipeline tests across records, guidelines, store and query engine.

mod end_to_end;
