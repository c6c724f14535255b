// Application layer: the card pipelines wired from domain ports and adapters.

pub mod pipelines;
